use super::calibration::{calibrate_company, domain_matches};
use super::response::{
    optional_bool, optional_f64, optional_str, parse_json_object, prose_explanation, required_str,
    string_list,
};
use super::{LlmBackend, ValidationFailure};
use crate::app::ports::{Completion, CompletionRequest, OrganizationValidation};
use crate::constants::UNKNOWN_DOMAIN;
use crate::metrics;
use crate::types::{CompanyOutcome, Provenance, ValidationOutcome};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, error};

const VALIDATOR: &str = "company";

/// Base confidence when the model omits its own score
const DEFAULT_MODEL_CONFIDENCE: f64 = 0.5;

const INSTRUCTIONS: &str = r#"
# Identity
You are an expert in global companies and commercial brands.

# Instructions
- Always perform a web search to identify the company.
- Ignore legal suffixes (SARL, SA, AG, etc.) when searching.
- Return the current publicly used trade name.
- If recently renamed, use the new name.
- For subsidiaries, use the main brand unless distinct.
- Evaluate confidence (0-1) on:
    • Certainty of identification
    • Match with email domain
    • Whether it's well-known
- If not found, clean the name and mark unknown.
- Preserve special characters.
- Do not guess or invent.
- You MUST return a JSON object with:

{
    "nom_commercial": "Meta",
    "confidence": 0.95,
    "explication": "Nom officiel après changement en 2021.",
    "changement_nom": true,
    "entreprise_connue": true,
    "citations": ["https://example.com"]
}
"#;

/// Resolves a raw company name to its current trade name, using the
/// service's web search and the prospect's email domain as evidence.
#[derive(Debug, Clone)]
pub struct CompanyValidator {
    backend: LlmBackend,
    max_tokens: u32,
}

impl CompanyValidator {
    pub fn new(backend: LlmBackend, max_tokens: u32) -> Self {
        Self {
            backend,
            max_tokens,
        }
    }

    fn build_prompt(company: &str, domain_hint: &str) -> String {
        let domain = if domain_hint.is_empty() || domain_hint.eq_ignore_ascii_case("nan") {
            UNKNOWN_DOMAIN
        } else {
            domain_hint
        };
        format!("Entreprise: \"{company}\", Domaine email: \"{domain}\"")
    }

    /// Turn the service reply into a calibrated outcome
    fn interpret(
        company: &str,
        domain_hint: &str,
        completion: Completion,
    ) -> Result<CompanyOutcome, ValidationFailure> {
        let data = parse_json_object(&completion.text)?;
        let trade_name = required_str(&data, "nom_commercial")?;

        let mut citations = completion.citations;
        citations.extend(string_list(&data, "citations"));

        let explanation = optional_str(&data, "explication")
            .unwrap_or_else(|| prose_explanation(&completion.text));

        let base = optional_f64(&data, "confidence").unwrap_or(DEFAULT_MODEL_CONFIDENCE);
        let unknown = !optional_bool(&data, "entreprise_connue").unwrap_or(true);
        let domain_match = domain_matches(domain_hint, &trade_name);
        let confidence = calibrate_company(base, citations.len(), domain_match, unknown);

        Ok(CompanyOutcome {
            company: ValidationOutcome {
                original: company.to_string(),
                corrected: trade_name,
                confidence,
                provenance: Provenance::Llm,
                explanation,
            },
            citations,
        })
    }

    async fn ask(&self, company: &str, domain_hint: &str) -> Result<CompanyOutcome, ValidationFailure> {
        let Some(client) = self.backend.service() else {
            return Err(ValidationFailure::Transport("no backend configured".to_string()));
        };
        let request = CompletionRequest {
            instructions: Some(INSTRUCTIONS.to_string()),
            prompt: Self::build_prompt(company, domain_hint),
            max_tokens: self.max_tokens,
            temperature: None,
            web_search: true,
        };
        let completion = client.complete(&request).await?;
        Self::interpret(company, domain_hint, completion)
    }
}

#[async_trait]
impl OrganizationValidation for CompanyValidator {
    async fn validate(&self, company: &str, domain_hint: &str) -> CompanyOutcome {
        let company = company.trim();
        let domain_hint = domain_hint.trim();

        if !self.backend.is_enabled() || company.is_empty() {
            return CompanyOutcome::without_citations(ValidationOutcome::unchanged(company));
        }

        let started = Instant::now();
        let outcome = self.ask(company, domain_hint).await;
        metrics::validation_call(VALIDATOR, started.elapsed().as_secs_f64());

        match outcome {
            Ok(outcome) => {
                debug!(
                    entreprise = %company,
                    nom_commercial = %outcome.company.corrected,
                    confidence = outcome.company.confidence,
                    citations = outcome.citations.len(),
                    "Company validated"
                );
                outcome
            }
            Err(e) => {
                error!("Company LLM error ({}): {}", company, e);
                metrics::validation_failure(VALIDATOR);
                CompanyOutcome::without_citations(ValidationOutcome::failed(company, e.to_string()))
            }
        }
    }
}
