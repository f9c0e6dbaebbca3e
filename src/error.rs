use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanerError {
    #[error("Failed to load table from '{path}': {reason}")]
    Load { path: String, reason: String },

    #[error("Failed to persist table to '{path}': {reason}")]
    Persist { path: String, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Row {0} is out of range")]
    RowOutOfRange(usize),

    #[error("Row {0} was already processed")]
    AlreadyProcessed(usize),

    #[error("Concurrency gate closed")]
    GateClosed,

    #[error("Background task failed: {0}")]
    Task(String),
}

impl CleanerError {
    pub fn load(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        CleanerError::Load {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn persist(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        CleanerError::Persist {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CleanerError>;
