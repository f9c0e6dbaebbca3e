use super::record_store::RecordStore;
use crate::app::ports::TableStore;
use crate::config::PipelineConfig;
use crate::error::{CleanerError, Result};
use crate::metrics;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// When to persist: every `batch_size` newly processed rows or after
/// `interval` without a save, checked every `poll_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointPolicy {
    pub batch_size: usize,
    pub interval: Duration,
    pub poll_interval: Duration,
}

impl From<&PipelineConfig> for CheckpointPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            interval: config.checkpoint_interval(),
            poll_interval: config.poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckpointStats {
    pub intermediate: usize,
    pub final_writes: usize,
}

impl CheckpointStats {
    pub fn total(&self) -> usize {
        self.intermediate + self.final_writes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckpointKind {
    Intermediate,
    Final,
}

impl CheckpointKind {
    fn as_str(&self) -> &'static str {
        match self {
            CheckpointKind::Intermediate => "intermediate",
            CheckpointKind::Final => "final",
        }
    }
}

/// Background loop that saves the record store while rows are processed.
pub struct CheckpointScheduler {
    store: Arc<RecordStore>,
    table_store: Arc<dyn TableStore>,
    destination: PathBuf,
    policy: CheckpointPolicy,
}

impl CheckpointScheduler {
    pub fn new(
        store: Arc<RecordStore>,
        table_store: Arc<dyn TableStore>,
        destination: PathBuf,
        policy: CheckpointPolicy,
    ) -> Self {
        Self {
            store,
            table_store,
            destination,
            policy,
        }
    }

    /// Runs until every row is processed or `done` fires (or its sender is
    /// dropped), then writes one final save. The first failed save ends the
    /// loop with `CleanerError::Persist`.
    pub async fn run(self, mut done: oneshot::Receiver<()>) -> Result<CheckpointStats> {
        let total = self.store.len();
        let mut last_count = self.store.processed_count();
        let mut last_save = Instant::now();
        let mut stats = CheckpointStats::default();
        let mut finished = false;

        loop {
            if !finished {
                tokio::select! {
                    _ = tokio::time::sleep(self.policy.poll_interval) => {}
                    _ = &mut done => finished = true,
                }
            }

            let count = self.store.processed_count();
            let newly_processed = count.saturating_sub(last_count);
            if newly_processed >= self.policy.batch_size
                || last_save.elapsed() > self.policy.interval
            {
                self.persist(CheckpointKind::Intermediate, count).await?;
                stats.intermediate += 1;
                last_count = count;
                last_save = Instant::now();
            }

            if count >= total || finished {
                self.persist(CheckpointKind::Final, count).await?;
                stats.final_writes += 1;
                return Ok(stats);
            }
        }
    }

    async fn persist(&self, kind: CheckpointKind, processed: usize) -> Result<()> {
        let started = Instant::now();
        let store = Arc::clone(&self.store);
        let table_store = Arc::clone(&self.table_store);
        let destination = self.destination.clone();

        tokio::task::spawn_blocking(move || {
            let snapshot = store.snapshot();
            table_store.save(&snapshot, &destination)
        })
        .await
        .map_err(|e| CleanerError::Task(format!("checkpoint writer: {e}")))??;

        let elapsed = started.elapsed();
        metrics::checkpoint_written(kind.as_str(), elapsed.as_secs_f64());
        match kind {
            CheckpointKind::Intermediate => debug!(
                processed,
                total = self.store.len(),
                "Checkpoint saved to {}",
                self.destination.display()
            ),
            CheckpointKind::Final => info!(
                processed,
                total = self.store.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Final save to {}",
                self.destination.display()
            ),
        }
        Ok(())
    }
}
