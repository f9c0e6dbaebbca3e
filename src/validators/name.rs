use super::calibration::{calibrate_name, name_similarity};
use super::response::{optional_str, parse_json_object, required_f64, required_str};
use super::{LlmBackend, ValidationFailure};
use crate::app::ports::{CompletionRequest, IdentityValidation};
use crate::metrics;
use crate::types::{IdentityOutcome, Provenance, ValidationOutcome};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, error};

const VALIDATOR: &str = "name";

const PROMPT_TEMPLATE: &str = r#"
Analyse et corrige si nécessaire ces informations de nom/prénom:
Nom: "{nom}"
Prénom: "{prenom}"
{contact}
Problèmes possibles à corriger :
- Inversion nom/prénom
- Noms composés mal séparés
- Noms multiculturels (portugais, indiens, chinois, etc.)
- Noms composés de type « nom de mariage + nom de jeune-fille » (ex : « Sophie Riben Bascher » → Prénom : « Sophie », Nom : « Riben Bascher »)

Pour le score de confiance, évalue entre 0 et 1 sur ces critères :
- Cohérence culturelle (les noms correspondent à une même origine)
- Probabilité que la séparation soit correcte
- Complexité du cas (noms composés = moins de confiance)
- Certitude de la correction appliquée

Réponds uniquement en JSON :
{
    "nom_corrige": "nom corrigé",
    "prenom_corrige": "prénom corrigé",
    "confidence_nom": 0.95,
    "confidence_prenom": 0.90,
    "reasoning": "justification du score de confiance",
    "corrections_appliquees": "description des corrections"
}
"#;

/// Corrects swapped or badly split last/first names.
#[derive(Debug, Clone)]
pub struct NameValidator {
    backend: LlmBackend,
    max_tokens: u32,
    temperature: f64,
}

/// Parsed, not yet calibrated model answer
#[derive(Debug, Clone, PartialEq)]
struct NameAnswer {
    last_name: String,
    first_name: String,
    last_name_confidence: f64,
    first_name_confidence: f64,
    explanation: String,
}

impl NameValidator {
    pub fn new(backend: LlmBackend, max_tokens: u32, temperature: f64) -> Self {
        Self {
            backend,
            max_tokens,
            temperature,
        }
    }

    fn build_prompt(last_name: &str, first_name: &str, contact_hint: &str) -> String {
        let contact = if contact_hint.is_empty() {
            String::new()
        } else {
            format!("Email: \"{contact_hint}\"\n")
        };
        PROMPT_TEMPLATE
            .replace("{nom}", last_name)
            .replace("{prenom}", first_name)
            .replace("{contact}", &contact)
    }

    fn parse_answer(text: &str) -> Result<NameAnswer, ValidationFailure> {
        let data = parse_json_object(text)?;
        let explanation = [
            optional_str(&data, "reasoning"),
            optional_str(&data, "corrections_appliquees"),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" | ");

        Ok(NameAnswer {
            last_name: required_str(&data, "nom_corrige")?,
            first_name: required_str(&data, "prenom_corrige")?,
            last_name_confidence: required_f64(&data, "confidence_nom")?,
            first_name_confidence: required_f64(&data, "confidence_prenom")?,
            explanation,
        })
    }

    async fn ask(
        &self,
        last_name: &str,
        first_name: &str,
        contact_hint: &str,
    ) -> Result<NameAnswer, ValidationFailure> {
        let Some(client) = self.backend.service() else {
            // validate() short-circuits before reaching this point
            return Err(ValidationFailure::Transport("no backend configured".to_string()));
        };
        let request = CompletionRequest {
            instructions: None,
            prompt: Self::build_prompt(last_name, first_name, contact_hint),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            web_search: false,
        };
        let completion = client.complete(&request).await?;
        Self::parse_answer(&completion.text)
    }

    fn calibrated(original: &str, corrected: String, confidence: f64, explanation: &str) -> ValidationOutcome {
        let similarity = name_similarity(original, &corrected);
        ValidationOutcome {
            original: original.to_string(),
            confidence: calibrate_name(confidence, similarity),
            corrected,
            provenance: Provenance::Llm,
            explanation: explanation.to_string(),
        }
    }
}

#[async_trait]
impl IdentityValidation for NameValidator {
    async fn validate(&self, last_name: &str, first_name: &str, contact_hint: &str) -> IdentityOutcome {
        let last_name = last_name.trim();
        let first_name = first_name.trim();
        let contact_hint = contact_hint.trim();

        if !self.backend.is_enabled() || (last_name.is_empty() && first_name.is_empty()) {
            return IdentityOutcome {
                last_name: ValidationOutcome::unchanged(last_name),
                first_name: ValidationOutcome::unchanged(first_name),
                explanation: String::new(),
            };
        }

        let started = Instant::now();
        let answer = self.ask(last_name, first_name, contact_hint).await;
        metrics::validation_call(VALIDATOR, started.elapsed().as_secs_f64());

        match answer {
            Ok(answer) => {
                debug!(
                    nom = %last_name,
                    prenom = %first_name,
                    nom_corrige = %answer.last_name,
                    prenom_corrige = %answer.first_name,
                    "Name validated"
                );
                IdentityOutcome {
                    last_name: Self::calibrated(
                        last_name,
                        answer.last_name,
                        answer.last_name_confidence,
                        &answer.explanation,
                    ),
                    first_name: Self::calibrated(
                        first_name,
                        answer.first_name,
                        answer.first_name_confidence,
                        &answer.explanation,
                    ),
                    explanation: answer.explanation,
                }
            }
            Err(e) => {
                error!("Name LLM error ({} {}): {}", last_name, first_name, e);
                metrics::validation_failure(VALIDATOR);
                let note = e.to_string();
                IdentityOutcome {
                    last_name: ValidationOutcome::failed(last_name, note.clone()),
                    first_name: ValidationOutcome::failed(first_name, note.clone()),
                    explanation: note,
                }
            }
        }
    }
}
