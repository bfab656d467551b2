//! In-memory store, scripted driver, and recording observer for engine tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use contactfill_lookup::LookupDriver;
use contactfill_shared::{Batch, Credentials, LookupQuery, Record, RecordId, Result, SessionId};
use contactfill_storage::RecordStore;

use crate::engine::{AttemptOutcome, EngineObserver, EngineState, SessionReport};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    current: Batch,
    saves: Vec<Batch>,
}

/// Record store that keeps every saved snapshot. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub(crate) fn new(batch: Batch) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                current: batch,
                saves: Vec::new(),
            })),
        }
    }

    pub(crate) fn current(&self) -> Batch {
        self.state.lock().unwrap().current.clone()
    }

    pub(crate) fn saves(&self) -> Vec<Batch> {
        self.state.lock().unwrap().saves.clone()
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> Result<Batch> {
        Ok(self.current())
    }

    fn save(&self, batch: &Batch) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.current = batch.clone();
        state.saves.push(batch.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedDriver
// ---------------------------------------------------------------------------

type Responder = Box<dyn FnMut(&LookupQuery) -> Result<String> + Send>;

/// What the scripted driver was asked to do.
#[derive(Debug, Default)]
pub(crate) struct DriverLog {
    pub(crate) queries: Vec<String>,
    pub(crate) logins: usize,
    pub(crate) closes: usize,
}

/// Lookup driver answering from a closure and logging every call.
pub(crate) struct ScriptedDriver {
    respond: Responder,
    logins: VecDeque<Result<()>>,
    log: Arc<Mutex<DriverLog>>,
}

impl ScriptedDriver {
    pub(crate) fn new(
        respond: impl FnMut(&LookupQuery) -> Result<String> + Send + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            logins: VecDeque::new(),
            log: Arc::new(Mutex::new(DriverLog::default())),
        }
    }

    /// Answer the next logins with these results, then succeed.
    pub(crate) fn with_logins(mut self, results: Vec<Result<()>>) -> Self {
        self.logins = results.into();
        self
    }

    pub(crate) fn log(&self) -> Arc<Mutex<DriverLog>> {
        self.log.clone()
    }
}

#[async_trait]
impl LookupDriver for ScriptedDriver {
    async fn authenticate(&mut self, _credentials: &Credentials) -> Result<()> {
        self.log.lock().unwrap().logins += 1;
        self.logins.pop_front().unwrap_or(Ok(()))
    }

    async fn lookup(&mut self, query: &LookupQuery) -> Result<String> {
        self.log.lock().unwrap().queries.push(query.name.clone());
        (self.respond)(query)
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closes += 1;
    }
}

/// Deterministic per-person address.
pub(crate) fn email_for(query: &LookupQuery) -> String {
    format!("{}@example.com", query.name.to_lowercase().replace(' ', "."))
}

// ---------------------------------------------------------------------------
// RecordingObserver
// ---------------------------------------------------------------------------

/// Observer that keeps the state transitions and attempt outcomes it saw.
#[derive(Default)]
pub(crate) struct RecordingObserver {
    pub(crate) states: Mutex<Vec<EngineState>>,
    pub(crate) attempts: Mutex<Vec<(RecordId, u32, AttemptOutcome)>>,
    pub(crate) sessions: Mutex<Vec<(SessionId, usize)>>,
}

impl EngineObserver for RecordingObserver {
    fn state_changed(&self, state: EngineState) {
        self.states.lock().unwrap().push(state);
    }

    fn session_started(&self, id: SessionId, quota: usize, _total: usize) {
        self.sessions.lock().unwrap().push((id, quota));
    }

    fn record_attempted(
        &self,
        id: RecordId,
        _record: &Record,
        attempt: u32,
        outcome: &AttemptOutcome,
    ) {
        self.attempts
            .lock()
            .unwrap()
            .push((id, attempt, outcome.clone()));
    }

    fn session_finished(&self, _report: &SessionReport) {}
}

/// Batch of unresolved records named `Person<i> Test` for `i` in `0..n`.
pub(crate) fn people(n: usize) -> Batch {
    Batch::new(
        (0..n)
            .map(|i| Record::new(format!("Person{i}"), "Test"))
            .collect(),
    )
}
