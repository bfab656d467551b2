//! Resumable enrichment engine for ContactFill.
//!
//! This crate drives a [`LookupDriver`](contactfill_lookup::LookupDriver) over a
//! record batch one record at a time, checkpointing through a
//! [`RecordStore`](contactfill_storage::RecordStore) after every mutation and
//! restarting the lookup session when the source starts repeating itself.

pub mod anomaly;
pub mod checkpoint;
pub mod engine;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use anomaly::{AnomalyDetector, Observation};
pub use checkpoint::CheckpointedBatch;
pub use engine::{
    AttemptOutcome, Engine, EngineObserver, EngineState, RunOutcome, RunReport, SessionEnd,
    SessionReport, SilentObserver,
};
pub use scheduler::RetryScheduler;
