//! The cleaning pipeline: one task per row behind a concurrency gate, a
//! shared record store, and a background checkpoint loop.

pub mod checkpoint;
pub mod gate;
pub mod orchestrator;
pub mod record_store;
pub mod row_processor;
pub mod summary;

pub use checkpoint::{CheckpointPolicy, CheckpointScheduler, CheckpointStats};
pub use gate::{ConcurrencyGate, GatePermit};
pub use orchestrator::ProspectCleaner;
pub use record_store::{RecordStore, RowInput};
pub use row_processor::{RowProcessor, RowStatus};
pub use summary::{CorrectionExample, RunSummary};
