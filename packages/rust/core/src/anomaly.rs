//! Duplicate-result detection within one lookup session.
//!
//! Distinct records must map to distinct values. When the source hands back a
//! value it already returned this session, it is most likely serving a generic
//! page because it has started throttling us.

use std::collections::HashSet;

/// Result of observing one looked-up value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First time this session.
    Fresh,
    /// Already returned earlier this session.
    Duplicate,
}

/// Set of values returned so far in the current session. Never persisted.
#[derive(Debug, Default)]
pub struct AnomalyDetector {
    seen: HashSet<String>,
}

impl AnomalyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `value` against earlier results, remembering it if it is new.
    pub fn observe(&mut self, value: &str) -> Observation {
        if self.seen.insert(normalize(value)) {
            Observation::Fresh
        } else {
            Observation::Duplicate
        }
    }

    /// Distinct values seen this session.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

// Addresses differing only in case or padding are the same address.
fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_occurrence_is_duplicate() {
        let mut detector = AnomalyDetector::new();
        assert_eq!(detector.observe("x@example.com"), Observation::Fresh);
        assert_eq!(detector.observe("y@example.com"), Observation::Fresh);
        assert_eq!(detector.observe("x@example.com"), Observation::Duplicate);
        assert_eq!(detector.len(), 2);
    }

    #[test]
    fn case_and_whitespace_do_not_hide_a_repeat() {
        let mut detector = AnomalyDetector::new();
        assert_eq!(detector.observe("X@Example.com"), Observation::Fresh);
        assert_eq!(detector.observe(" x@example.com "), Observation::Duplicate);
    }

    #[test]
    fn fresh_detector_has_no_history() {
        let mut first = AnomalyDetector::new();
        first.observe("x@example.com");

        let mut second = AnomalyDetector::new();
        assert!(second.is_empty());
        assert_eq!(second.observe("x@example.com"), Observation::Fresh);
    }
}
