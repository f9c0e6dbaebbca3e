use crate::constants::{
    DEFAULT_COMPANY_COL, DEFAULT_EMAIL_COL, DEFAULT_FIRST_NAME_COL, DEFAULT_LAST_NAME_COL,
};
use crate::error::{CleanerError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub columns: ColumnConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Missing or empty key disables every external call
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub name_temperature: f64,
    pub timeout_seconds: u64,
    /// Country hint for the web-search tool
    pub search_country: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1-mini".to_string(),
            max_tokens: 300,
            name_temperature: 0.1,
            timeout_seconds: 60,
            search_country: "CH".to_string(),
        }
    }
}

impl LlmConfig {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Simultaneous external calls
    pub max_concurrency: usize,
    /// Rows processed between two checkpoints
    pub batch_size: usize,
    /// Maximum seconds between two checkpoints
    pub checkpoint_interval_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            batch_size: 10,
            checkpoint_interval_secs: 10,
            poll_interval_ms: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(CleanerError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(CleanerError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Names of the input columns the validators read
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub last_name: String,
    pub first_name: String,
    pub company: String,
    pub email: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            last_name: DEFAULT_LAST_NAME_COL.to_string(),
            first_name: DEFAULT_FIRST_NAME_COL.to_string(),
            company: DEFAULT_COMPANY_COL.to_string(),
            email: DEFAULT_EMAIL_COL.to_string(),
        }
    }
}

impl ColumnConfig {
    pub fn with_overrides(&self, overrides: Option<&ColumnOverrides>) -> Self {
        let Some(o) = overrides else {
            return self.clone();
        };
        Self {
            last_name: o.last_name.clone().unwrap_or_else(|| self.last_name.clone()),
            first_name: o.first_name.clone().unwrap_or_else(|| self.first_name.clone()),
            company: o.company.clone().unwrap_or_else(|| self.company.clone()),
            email: o.email.clone().unwrap_or_else(|| self.email.clone()),
        }
    }

    /// Names of the columns read from the input table
    pub fn input_columns(&self) -> [&str; 4] {
        [
            self.last_name.as_str(),
            self.first_name.as_str(),
            self.company.as_str(),
            self.email.as_str(),
        ]
    }
}

/// Per-run column names, each falling back to the configured default
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ColumnOverrides {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
}

impl Config {
    /// Load `config.toml` when present, then apply environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH), false)
    }

    /// Load from an explicit path; `required` makes a missing file an error.
    pub fn load_from(path: &Path, required: bool) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                CleanerError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            toml::from_str(&content)?
        } else if required {
            return Err(CleanerError::Config(format!(
                "Config file '{}' not found",
                path.display()
            )));
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Environment wins over file values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(v) = lookup("PROSPECT_MAX_CONCURRENCY") {
            self.pipeline.max_concurrency = parse_env("PROSPECT_MAX_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("PROSPECT_BATCH_SIZE") {
            self.pipeline.batch_size = parse_env("PROSPECT_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("PROSPECT_CHECKPOINT_SECS") {
            self.pipeline.checkpoint_interval_secs = parse_env("PROSPECT_CHECKPOINT_SECS", &v)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CleanerError::Config(format!("{key} has an invalid value: '{value}'")))
}
