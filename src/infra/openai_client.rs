use crate::app::ports::{Completion, CompletionRequest, LanguageModelPort};
use crate::config::LlmConfig;
use crate::error::Result;
use crate::validators::{MalformedResponse, ValidationFailure};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Longest error body kept in a failure message
const ERROR_BODY_LIMIT: usize = 300;

/// OpenAI-compatible client. Plain prompts go to the chat-completions
/// endpoint; web-search prompts go to the responses endpoint, which returns
/// URL citations as annotations.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    search_country: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            search_country: config.search_country.clone(),
        })
    }

    fn chat_body(&self, request: &CompletionRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(instructions) = &request.instructions {
            messages.push(json!({ "role": "system", "content": instructions }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
        });
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }
        body
    }

    fn responses_body(&self, request: &CompletionRequest) -> Value {
        let mut input = Vec::new();
        if let Some(instructions) = &request.instructions {
            input.push(json!({ "role": "developer", "content": instructions }));
        }
        input.push(json!({ "role": "user", "content": request.prompt }));

        let mut body = json!({
            "model": self.model,
            "input": input,
            "max_output_tokens": request.max_tokens,
            "tools": [{
                "type": "web_search_preview",
                "user_location": { "type": "approximate", "country": self.search_country },
            }],
        });
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }
        body
    }

    async fn post(&self, endpoint: &str, body: &Value) -> std::result::Result<String, ValidationFailure> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ValidationFailure::Status {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl LanguageModelPort for OpenAiClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<Completion, ValidationFailure> {
        if request.web_search {
            let raw = self.post("responses", &self.responses_body(request)).await?;
            parse_responses_reply(&raw)
        } else {
            let raw = self.post("chat/completions", &self.chat_body(request)).await?;
            parse_chat_reply(&raw)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: Option<String>,
}

/// First choice of a chat-completions reply
pub fn parse_chat_reply(raw: &str) -> std::result::Result<Completion, ValidationFailure> {
    let reply: ChatReply = serde_json::from_str(raw)
        .map_err(|e| MalformedResponse::NotJson(e.to_string()))?;
    let text = reply
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(MalformedResponse::Empty)?;
    Ok(Completion::text(text))
}

/// Message texts of a responses-API reply, joined by blank lines, plus every
/// `url_citation` annotation in order.
pub fn parse_responses_reply(raw: &str) -> std::result::Result<Completion, ValidationFailure> {
    let reply: ResponsesReply = serde_json::from_str(raw)
        .map_err(|e| MalformedResponse::NotJson(e.to_string()))?;

    let mut texts = Vec::new();
    let mut citations = Vec::new();
    for item in reply.output.into_iter().filter(|i| i.kind == "message") {
        for chunk in item.content {
            if let Some(text) = chunk.text {
                texts.push(text.trim().to_string());
            }
            citations.extend(
                chunk
                    .annotations
                    .into_iter()
                    .filter(|a| a.kind == "url_citation")
                    .filter_map(|a| a.url)
                    .filter(|u| !u.is_empty()),
            );
        }
    }

    let text = texts.join("\n\n");
    if text.trim().is_empty() {
        return Err(MalformedResponse::Empty.into());
    }
    Ok(Completion { text, citations })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(&LlmConfig::default(), "sk-test").unwrap()
    }

    #[test]
    fn test_chat_reply_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  {\"a\":1}  "}}]}"#;
        assert_eq!(parse_chat_reply(raw).unwrap().text, "{\"a\":1}");
    }

    #[test]
    fn test_chat_reply_without_content_is_malformed() {
        let raw = r#"{"choices":[]}"#;
        assert!(matches!(
            parse_chat_reply(raw),
            Err(ValidationFailure::Malformed(MalformedResponse::Empty))
        ));
        assert!(matches!(
            parse_chat_reply("<html>502</html>"),
            Err(ValidationFailure::Malformed(MalformedResponse::NotJson(_)))
        ));
    }

    #[test]
    fn test_responses_reply_collects_text_and_citations() {
        let raw = r#"{
            "output": [
                {"type": "web_search_call", "status": "completed"},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "Meta est le nom actuel.",
                     "annotations": [
                        {"type": "url_citation", "url": "https://about.meta.com"},
                        {"type": "file_citation"}
                     ]},
                    {"type": "output_text", "text": "```json\n{}\n```"}
                ]}
            ]
        }"#;
        let completion = parse_responses_reply(raw).unwrap();
        assert_eq!(completion.text, "Meta est le nom actuel.\n\n```json\n{}\n```");
        assert_eq!(completion.citations, vec!["https://about.meta.com"]);
    }

    #[test]
    fn test_request_bodies() {
        let client = client();
        let request = CompletionRequest {
            instructions: Some("be brief".to_string()),
            prompt: "hello".to_string(),
            max_tokens: 300,
            temperature: Some(0.1),
            web_search: false,
        };
        let chat = client.chat_body(&request);
        assert_eq!(chat["max_tokens"], 300);
        assert_eq!(chat["messages"][0]["role"], "system");
        assert_eq!(chat["messages"][1]["content"], "hello");

        let responses = client.responses_body(&request);
        assert_eq!(responses["max_output_tokens"], 300);
        assert_eq!(responses["input"][0]["role"], "developer");
        assert_eq!(responses["tools"][0]["type"], "web_search_preview");
        assert_eq!(responses["tools"][0]["user_location"]["country"], "CH");
    }
}
