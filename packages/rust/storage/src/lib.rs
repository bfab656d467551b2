//! Durable record batch storage.
//!
//! The [`RecordStore`] trait is the engine's only view of persistence: a bulk
//! load at run start and a bulk overwrite after every record mutation.
//! [`CsvRecordStore`] implements it over the connections CSV export.
//!
//! **Access rules:**
//! - Exactly one writer per store path (the running engine)
//! - Every `save` replaces the whole stored batch

mod csv_store;

use contactfill_shared::{Batch, Result};

pub use csv_store::{COLUMNS, CsvRecordStore};

/// Durable home of a record batch.
pub trait RecordStore: Send + Sync {
    /// Read the whole batch, in stored order.
    fn load(&self) -> Result<Batch>;

    /// Replace the stored batch with `batch`.
    fn save(&self, batch: &Batch) -> Result<()>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn load(&self) -> Result<Batch> {
        (**self).load()
    }

    fn save(&self, batch: &Batch) -> Result<()> {
        (**self).save(batch)
    }
}
