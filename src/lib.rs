pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod types;
pub mod validators;

// Layered boundaries: ports in app, adapters in infra
pub mod app;
pub mod infra;

pub use config::Config;
pub use error::{CleanerError, Result};
pub use pipeline::{ProspectCleaner, RunSummary};
