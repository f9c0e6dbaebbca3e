//! Extraction of structured answers from free-form model output.

use super::MalformedResponse;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static EMBEDDED_JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("valid regex"));
static ANY_JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json.*?```").expect("valid regex"));
static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid regex"));
static BULLET_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[-*•]\s*").expect("valid regex"));

/// Remove a leading ```` ```json ```` (or bare ```` ``` ````) marker and a trailing
/// ```` ``` ```` marker.
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// Parse the model answer as a JSON object, bare or fenced. Falls back to the
/// first fenced JSON block embedded in surrounding prose.
pub fn parse_json_object(text: &str) -> Result<Map<String, Value>, MalformedResponse> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(MalformedResponse::Empty);
    }

    let direct = serde_json::from_str::<Value>(body);
    if let Ok(Value::Object(map)) = direct {
        return Ok(map);
    }

    if let Some(block) = EMBEDDED_JSON_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
    {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(block.as_str()) {
            return Ok(map);
        }
    }

    match direct {
        Ok(_) => Err(MalformedResponse::NotJson("top-level value is not an object".to_string())),
        Err(e) => Err(MalformedResponse::NotJson(e.to_string())),
    }
}

pub fn required_str(map: &Map<String, Value>, key: &'static str) -> Result<String, MalformedResponse> {
    match map.get(key) {
        None | Some(Value::Null) => Err(MalformedResponse::MissingKey(key)),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(_) => Err(MalformedResponse::WrongType(key)),
    }
}

pub fn optional_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Numbers are accepted as JSON numbers or numeric strings.
pub fn required_f64(map: &Map<String, Value>, key: &'static str) -> Result<f64, MalformedResponse> {
    match map.get(key) {
        None | Some(Value::Null) => Err(MalformedResponse::MissingKey(key)),
        Some(value) => as_f64(value).ok_or(MalformedResponse::WrongType(key)),
    }
}

pub fn optional_f64(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(as_f64)
}

pub fn optional_bool(map: &Map<String, Value>, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "oui" | "yes" => Some(true),
            "false" | "non" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// String entries of an array field; anything else is ignored.
pub fn string_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Plain-text rationale from a prose answer: fenced JSON removed, markdown
/// links reduced to their label, bullet markers dropped, whitespace collapsed.
pub fn prose_explanation(raw: &str) -> String {
    let without_json = ANY_JSON_BLOCK.replace_all(raw, "");
    let without_links = MARKDOWN_LINK.replace_all(&without_json, "$1");
    let without_bullets = BULLET_PREFIX.replace_all(&without_links, "");
    without_bullets.split_whitespace().collect::<Vec<_>>().join(" ")
}
