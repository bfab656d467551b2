//! Breadth-first retry scheduling.
//!
//! Pass `p` admits every unresolved record whose retry count is at most `p`,
//! so each record gets its k-th attempt before any record gets its (k+1)-th.

use std::ops::Range;

use contactfill_shared::{Batch, Record};

/// Decides which records are attempted in which pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryScheduler {
    max_retries: u32,
}

impl RetryScheduler {
    /// `max_retries` is the per-record attempt ceiling and the number of passes.
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Pass numbers of one session, in order.
    pub fn passes(&self) -> Range<u32> {
        0..self.max_retries
    }

    /// Record has used up its attempts and is skipped for good.
    pub fn is_exhausted(&self, record: &Record) -> bool {
        record.retries >= self.max_retries
    }

    /// Record still needs a value and may get another attempt at some pass.
    pub fn is_pending(&self, record: &Record) -> bool {
        record.is_queryable() && !record.is_resolved() && !self.is_exhausted(record)
    }

    /// Record may be attempted in pass `pass`.
    pub fn is_eligible(&self, record: &Record, pass: u32) -> bool {
        self.is_pending(record) && record.retries <= pass
    }

    /// Attempts allowed in one session: the requested maximum, capped by pending records.
    pub fn quota(&self, requested: usize, batch: &Batch) -> usize {
        let pending = batch.records().iter().filter(|r| self.is_pending(r)).count();
        requested.min(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(retries: u32, email: Option<&str>) -> Record {
        Record {
            retries,
            email: email.map(String::from),
            ..Record::new("Ada", "Lovelace")
        }
    }

    #[test]
    fn resolved_record_is_never_eligible() {
        let scheduler = RetryScheduler::new(3);
        let done = record(0, Some("ada@example.com"));
        assert!(scheduler.passes().all(|p| !scheduler.is_eligible(&done, p)));
    }

    #[test]
    fn retry_count_gates_the_pass() {
        let scheduler = RetryScheduler::new(3);
        let twice = record(2, None);
        assert!(!scheduler.is_eligible(&twice, 0));
        assert!(!scheduler.is_eligible(&twice, 1));
        assert!(scheduler.is_eligible(&twice, 2));
    }

    #[test]
    fn exhausted_record_is_skipped_but_counted_unresolved() {
        let scheduler = RetryScheduler::new(2);
        let spent = record(2, None);
        assert!(scheduler.is_exhausted(&spent));
        assert!(!scheduler.is_pending(&spent));
        assert!(!spent.is_resolved());
        assert_eq!(scheduler.passes(), 0..2);
    }

    #[test]
    fn unnamed_record_is_never_eligible() {
        let scheduler = RetryScheduler::new(2);
        let unnamed = Record::new("", "");
        assert!(!scheduler.is_eligible(&unnamed, 1));
    }

    #[test]
    fn quota_is_capped_by_pending_records() {
        let scheduler = RetryScheduler::new(2);
        let batch = Batch::new(vec![
            record(0, None),
            record(1, None),
            record(2, None),
            record(0, Some("done@example.com")),
            Record::new("", ""),
        ]);
        assert_eq!(scheduler.quota(100, &batch), 2);
        assert_eq!(scheduler.quota(1, &batch), 1);
        assert_eq!(scheduler.quota(0, &batch), 0);
    }
}
