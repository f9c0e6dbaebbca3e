use super::checkpoint::{CheckpointPolicy, CheckpointScheduler, CheckpointStats};
use super::gate::ConcurrencyGate;
use super::record_store::RecordStore;
use super::row_processor::RowProcessor;
use super::summary::RunSummary;
use crate::app::ports::{IdentityValidation, OrganizationValidation, TableStore};
use crate::config::{ColumnConfig, ColumnOverrides, Config, PipelineConfig};
use crate::error::{CleanerError, Result};
use crate::infra::CsvTableStore;
use crate::metrics;
use crate::types::Table;
use crate::validators::{CompanyValidator, LlmBackend, NameValidator};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Cleans one prospect file: validates every row concurrently and saves
/// the enriched table as it goes.
#[derive(Clone)]
pub struct ProspectCleaner {
    pipeline: PipelineConfig,
    columns: ColumnConfig,
    identity: Arc<dyn IdentityValidation>,
    organization: Arc<dyn OrganizationValidation>,
    table_store: Arc<dyn TableStore>,
}

impl ProspectCleaner {
    /// Production wiring: OpenAI-backed validators (or none without a key) and CSV files.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = LlmBackend::from_config(&config.llm)?;
        Ok(Self::with_backend(config, backend))
    }

    /// Real validators over the given backend, CSV files on disk.
    pub fn with_backend(config: &Config, backend: LlmBackend) -> Self {
        let identity = NameValidator::new(
            backend.clone(),
            config.llm.max_tokens,
            config.llm.name_temperature,
        );
        let organization = CompanyValidator::new(backend, config.llm.max_tokens);
        Self::with_components(
            config.pipeline.clone(),
            config.columns.clone(),
            Arc::new(identity),
            Arc::new(organization),
            Arc::new(CsvTableStore::new()),
        )
    }

    pub fn with_components(
        pipeline: PipelineConfig,
        columns: ColumnConfig,
        identity: Arc<dyn IdentityValidation>,
        organization: Arc<dyn OrganizationValidation>,
        table_store: Arc<dyn TableStore>,
    ) -> Self {
        Self {
            pipeline,
            columns,
            identity,
            organization,
            table_store,
        }
    }

    pub fn with_table_store(mut self, table_store: Arc<dyn TableStore>) -> Self {
        self.table_store = table_store;
        self
    }

    /// Loads `input`, validates every unprocessed row and writes the result
    /// to `output`, with intermediate saves along the way.
    ///
    /// Load and save failures abort the run; validation failures never do,
    /// they end up as `error` tags in the output.
    #[instrument(skip(self, input, output, overrides), fields(input = %input.display(), output = %output.display()))]
    pub async fn run(
        &self,
        input: &Path,
        output: &Path,
        overrides: Option<&ColumnOverrides>,
    ) -> Result<RunSummary> {
        self.pipeline.validate()?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let columns = self.columns.with_overrides(overrides);

        let mut table = self.load(input.to_path_buf()).await?;
        let dropped = table.drop_empty_columns(&columns.input_columns());
        if dropped > 0 {
            warn!(dropped, "Dropped columns without any value");
        }
        let store = Arc::new(RecordStore::from_table(table, &columns)?);
        let pending = store.pending_rows();
        info!(
            %run_id,
            rows = store.len(),
            pending = pending.len(),
            max_concurrency = self.pipeline.max_concurrency,
            "Starting cleaning run"
        );

        let gate = ConcurrencyGate::new(self.pipeline.max_concurrency);
        let processor = RowProcessor::new(
            Arc::clone(&store),
            gate.clone(),
            Arc::clone(&self.identity),
            Arc::clone(&self.organization),
        );
        let mut rows = JoinSet::new();
        for index in pending {
            let processor = processor.clone();
            rows.spawn(async move { processor.process(index).await });
        }

        let (done_tx, done_rx) = oneshot::channel();
        let scheduler = CheckpointScheduler::new(
            Arc::clone(&store),
            Arc::clone(&self.table_store),
            output.to_path_buf(),
            CheckpointPolicy::from(&self.pipeline),
        );
        let mut checkpoint_task = tokio::spawn(scheduler.run(done_rx));

        // The scheduler may finish first once the last row is recorded; a
        // failure on its side aborts every row still in flight.
        let mut checkpoints: Option<CheckpointStats> = None;
        let mut failed_rows = 0usize;
        loop {
            tokio::select! {
                joined = rows.join_next() => match joined {
                    Some(Ok(Ok(_))) => {}
                    Some(Ok(Err(e))) => {
                        warn!(error = %e, "Row task failed");
                        failed_rows += 1;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Row task panicked");
                        failed_rows += 1;
                    }
                    None => break,
                },
                finished = &mut checkpoint_task, if checkpoints.is_none() => {
                    match flatten(finished) {
                        Ok(stats) => checkpoints = Some(stats),
                        Err(e) => {
                            error!(error = %e, "Checkpoint failed, aborting run");
                            gate.close();
                            rows.abort_all();
                            return Err(e);
                        }
                    }
                }
            }
        }

        let _ = done_tx.send(());
        let checkpoints = match checkpoints {
            Some(stats) => stats,
            None => flatten(checkpoint_task.await)?,
        };

        if failed_rows > 0 {
            warn!(failed_rows, "Some rows were left unprocessed");
        }
        let summary = RunSummary::from_table(
            &store.snapshot(),
            &columns,
            checkpoints,
            run_id,
            started_at,
        );
        metrics::run_completed();
        info!(
            %run_id,
            processed = summary.processed_rows,
            checkpoints = checkpoints.total(),
            elapsed_ms = summary.duration().num_milliseconds(),
            "Cleaning finished ({} → {})",
            input.display(),
            output.display()
        );
        Ok(summary)
    }

    async fn load(&self, source: PathBuf) -> Result<Table> {
        let table_store = Arc::clone(&self.table_store);
        tokio::task::spawn_blocking(move || table_store.load(&source))
            .await
            .map_err(|e| CleanerError::Task(format!("table loader: {e}")))?
    }
}

fn flatten(joined: std::result::Result<Result<CheckpointStats>, JoinError>) -> Result<CheckpointStats> {
    joined.map_err(|e| CleanerError::Task(format!("checkpoint scheduler: {e}")))?
}
