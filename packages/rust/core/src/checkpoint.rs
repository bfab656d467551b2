//! Batch ownership with write-through checkpointing.
//!
//! The engine mutates records only through [`CheckpointedBatch`], and every
//! mutation rewrites the whole batch to the store before returning. A crash
//! therefore loses at most the lookup that was in flight.

use tracing::debug;

use contactfill_shared::{Batch, ContactFillError, Record, RecordId, Result};
use contactfill_storage::RecordStore;

/// A batch paired with the store it is checkpointed to.
pub struct CheckpointedBatch<S> {
    batch: Batch,
    store: S,
}

impl<S: RecordStore> CheckpointedBatch<S> {
    /// Take ownership of an already loaded batch.
    pub fn new(batch: Batch, store: S) -> Self {
        Self { batch, store }
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.batch.get(id)
    }

    /// Count one more attempt against `id` and persist. Returns the new retry count.
    pub fn mark_attempted(&mut self, id: RecordId) -> Result<u32> {
        let record = self.record_mut(id)?;
        record.retries += 1;
        let retries = record.retries;
        self.checkpoint()?;
        Ok(retries)
    }

    /// Store `value` as the record's target field and persist.
    pub fn mark_resolved(&mut self, id: RecordId, value: impl Into<String>) -> Result<()> {
        let record = self.record_mut(id)?;
        if record.is_resolved() {
            return Err(ContactFillError::validation(format!(
                "record {id} ({}) is already resolved",
                record.display_name()
            )));
        }
        record.email = Some(value.into());
        self.checkpoint()
    }

    fn record_mut(&mut self, id: RecordId) -> Result<&mut Record> {
        let len = self.batch.len();
        self.batch.get_mut(id).ok_or_else(|| {
            ContactFillError::validation(format!("record {id} out of range (batch has {len})"))
        })
    }

    fn checkpoint(&self) -> Result<()> {
        self.store.save(&self.batch)?;
        debug!(records = self.batch.len(), "checkpointed batch");
        Ok(())
    }
}
