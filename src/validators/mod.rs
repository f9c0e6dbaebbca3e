//! Field validators backed by the language-model service.
//!
//! Both validators share one contract: they never return an error. A missing
//! backend or blank input yields a `no_llm` outcome without any call; every
//! failure of the call itself yields an `error` outcome with zero confidence.

pub mod calibration;
pub mod company;
pub mod name;
pub mod response;

pub use company::CompanyValidator;
pub use name::NameValidator;

use crate::app::ports::LanguageModelPort;
use crate::config::LlmConfig;
use crate::error::Result;
use crate::infra::openai_client::OpenAiClient;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Why a single validation call could not produce a usable answer
#[derive(Error, Debug)]
pub enum ValidationFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(#[from] MalformedResponse),
}

impl From<reqwest::Error> for ValidationFailure {
    fn from(err: reqwest::Error) -> Self {
        ValidationFailure::Transport(err.to_string())
    }
}

/// The service answered, but not with the structure we asked for
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedResponse {
    #[error("empty response")]
    Empty,

    #[error("not a JSON object: {0}")]
    NotJson(String),

    #[error("missing key '{0}'")]
    MissingKey(&'static str),

    #[error("key '{0}' has an unexpected type")]
    WrongType(&'static str),
}

/// The language-model capability, or its explicit absence
#[derive(Clone)]
pub enum LlmBackend {
    Disabled,
    Service(Arc<dyn LanguageModelPort>),
}

impl LlmBackend {
    /// `Disabled` when no API key is configured, so validators never attempt a call.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        match config.api_key() {
            Some(key) => {
                let client = OpenAiClient::new(config, key)?;
                info!(model = %config.model, "Language-model client initialized");
                Ok(LlmBackend::Service(Arc::new(client)))
            }
            None => {
                warn!("No API key configured, rows will be tagged no_llm");
                Ok(LlmBackend::Disabled)
            }
        }
    }

    pub fn service(&self) -> Option<&Arc<dyn LanguageModelPort>> {
        match self {
            LlmBackend::Service(client) => Some(client),
            LlmBackend::Disabled => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, LlmBackend::Service(_))
    }
}

impl fmt::Debug for LlmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmBackend::Disabled => f.write_str("LlmBackend::Disabled"),
            LlmBackend::Service(_) => f.write_str("LlmBackend::Service(..)"),
        }
    }
}
