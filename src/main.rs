use anyhow::Context;
use clap::{Parser, Subcommand};
use prospect_cleaner::config::{ColumnOverrides, Config, DEFAULT_CONFIG_PATH};
use prospect_cleaner::pipeline::ProspectCleaner;
use prospect_cleaner::server::{self, AppState};
use prospect_cleaner::{logging, metrics};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "prospect_cleaner")]
#[command(about = "Clean a prospect CSV using LLM validation")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every row of a prospect file
    Clean {
        #[arg(short, long, default_value = "data/prospects_input.csv")]
        input: PathBuf,

        #[arg(short, long, default_value = "data/prospects_cleaned.csv")]
        output: PathBuf,

        /// Last-name column
        #[arg(long)]
        nom_col: Option<String>,

        /// First-name column
        #[arg(long)]
        prenom_col: Option<String>,

        /// Company column
        #[arg(long)]
        entreprise_col: Option<String>,

        /// Email column
        #[arg(long)]
        email_col: Option<String>,

        /// Rows validated at the same time
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Rows between two intermediate saves
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path, true),
        None => Config::load(),
    };
    config.with_context(|| {
        format!(
            "Failed to load configuration from {}",
            path.map(|p| p.display().to_string())
                .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
        )
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Clean {
            input,
            output,
            nom_col,
            prenom_col,
            entreprise_col,
            email_col,
            max_concurrency,
            batch_size,
        } => {
            if let Some(n) = max_concurrency {
                config.pipeline.max_concurrency = n;
            }
            if let Some(n) = batch_size {
                config.pipeline.batch_size = n;
            }
            config.pipeline.validate()?;

            let overrides = ColumnOverrides {
                last_name: nom_col,
                first_name: prenom_col,
                company: entreprise_col,
                email: email_col,
            };
            let cleaner = ProspectCleaner::from_config(&config)?;

            tokio::select! {
                result = cleaner.run(&input, &output, Some(&overrides)) => {
                    match result {
                        Ok(summary) => {
                            println!("\n{summary}");
                            info!(output = %output.display(), "Done");
                        }
                        Err(e) => {
                            error!("Cleaning failed: {}", e);
                            return Err(e).with_context(|| {
                                format!("Cleaning {} failed", input.display())
                            });
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted by user");
                }
            }
        }
        Commands::Serve { port } => {
            let handle = match metrics::init() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            };
            let state = Arc::new(AppState {
                cleaner: ProspectCleaner::from_config(&config)?,
                metrics: handle,
            });
            server::start_server(state, port)
                .await
                .context("HTTP server stopped")?;
        }
    }

    Ok(())
}
