use crate::error::Result;
use crate::types::{CompanyOutcome, IdentityOutcome, Table};
use crate::validators::ValidationFailure;
use async_trait::async_trait;
use std::path::Path;

/// One request to the language-model service
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    /// Developer/system instructions, sent ahead of the prompt when present
    pub instructions: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    /// Ask the service to ground its answer with a web search
    pub web_search: bool,
}

/// Text returned by the service plus any URLs it cited
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub citations: Vec<String>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }
}

// External validation service
#[async_trait]
pub trait LanguageModelPort: Send + Sync {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<Completion, ValidationFailure>;
}

/// Table I/O. Both calls are blocking; the pipeline runs them off the async workers.
pub trait TableStore: Send + Sync {
    fn load(&self, source: &Path) -> Result<Table>;
    fn save(&self, table: &Table, destination: &Path) -> Result<()>;
}

/// Validates a person's last and first name. Never fails: problems are
/// reported through the outcome's provenance.
#[async_trait]
pub trait IdentityValidation: Send + Sync {
    async fn validate(&self, last_name: &str, first_name: &str, contact_hint: &str)
        -> IdentityOutcome;
}

/// Validates a company name, optionally helped by an email domain. Never fails.
#[async_trait]
pub trait OrganizationValidation: Send + Sync {
    async fn validate(&self, company: &str, domain_hint: &str) -> CompanyOutcome;
}
