//! Core domain types for ContactFill record batches.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for lookup session identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new time-sortable session identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Position of a record within its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub usize);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One contact being enriched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub first_name: String,
    pub last_name: String,
    /// The enriched field. `None` until a lookup resolves it.
    pub email: Option<String>,
    pub company: String,
    pub position: String,
    pub connected_on: String,
    /// Lookup attempts made so far, across all runs.
    pub retries: u32,
}

impl Record {
    /// Build a record from its identifying fields, unresolved and unattempted.
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    /// Attach an affiliation.
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    /// Full display name, used in log lines and lookup queries.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    /// Whether the target field already holds a value.
    pub fn is_resolved(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    /// Whether the record carries enough identity to be looked up at all.
    pub fn is_queryable(&self) -> bool {
        !self.first_name.trim().is_empty() && !self.last_name.trim().is_empty()
    }

    /// Build the lookup query for this record, optionally narrowed by company.
    pub fn query(&self, include_company: bool) -> LookupQuery {
        LookupQuery {
            name: self.display_name(),
            company: Some(self.company.trim().to_string())
                .filter(|c| include_company && !c.is_empty()),
        }
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// The ordered set of records for a run. Order is the input order and never changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(id.0)
    }

    /// Mutable access by id. Callers outside the engine should not need this.
    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.get_mut(id.0)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records whose target field is set.
    pub fn resolved_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_resolved()).count()
    }
}

// ---------------------------------------------------------------------------
// Lookup inputs
// ---------------------------------------------------------------------------

/// Identifying attributes handed to the lookup driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    /// "Given Family".
    pub name: String,
    /// Affiliation, when the search should be narrowed by it.
    pub company: Option<String>,
}

impl LookupQuery {
    /// Search terms sent to the source.
    pub fn search_terms(&self) -> String {
        match &self.company {
            Some(company) => format!("{} {company}", self.name),
            None => self.name.clone(),
        }
    }
}

impl std::fmt::Display for LookupQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.company {
            Some(company) => write!(f, "{} ({company})", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Login material for the lookup source.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}
