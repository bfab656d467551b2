//! Enrichment engine: sessions, passes, per-record attempts, restarts.
//!
//! A run is a loop over sessions. Each session logs in once, derives a quota
//! from the current batch, and sweeps the batch in breadth-first passes,
//! checkpointing after every attempt. A session cut short by an anomaly, the
//! failure breaker, or an expired login is followed by a cooldown and a fresh
//! session against the same batch.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use contactfill_lookup::LookupDriver;
use contactfill_shared::{
    Batch, ContactFillError, Credentials, EnrichConfig, Record, RecordId, Result, SessionId,
};
use contactfill_storage::RecordStore;

use crate::anomaly::{AnomalyDetector, Observation};
use crate::checkpoint::CheckpointedBatch;
use crate::scheduler::RetryScheduler;

// ---------------------------------------------------------------------------
// States and reports
// ---------------------------------------------------------------------------

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Authenticating,
    Running,
    Cooldown,
    Finished,
}

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The session used its whole quota.
    QuotaReached,
    /// Every pass up to the retry ceiling ran.
    PassesExhausted,
    /// The source returned a value it already returned this session.
    Anomaly { record: RecordId, value: String },
    /// Too many lookups failed in a row.
    CircuitOpen { failures: u32 },
    /// The source asked for a new login.
    SessionExpired,
    /// Shutdown was requested.
    Cancelled,
}

/// Result of one lookup attempt, as reported to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Resolved(String),
    Duplicate(String),
    Failed(String),
}

/// Summary of one session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    /// Attempts the session was allowed.
    pub quota: usize,
    /// Attempts made.
    pub processed: usize,
    /// Records that got a value.
    pub resolved: usize,
    /// Attempts that failed.
    pub failed: usize,
    pub end: SessionEnd,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The last session met its quota, or no further progress is possible.
    Finished,
    /// No record needed work; nothing was attempted.
    NothingToDo,
    /// A session fell short and restarts are disabled.
    Incomplete,
    /// Login to the lookup source was refused.
    AuthenticationFailed(String),
    /// Shutdown was requested.
    Cancelled,
}

/// Summary of a whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub sessions: Vec<SessionReport>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.sessions.iter().map(|s| s.processed).sum()
    }

    pub fn resolved(&self) -> usize {
        self.sessions.iter().map(|s| s.resolved).sum()
    }

    /// Login refusal before any session ran. A refusal on a restart, after
    /// progress was checkpointed, does not count.
    pub fn refused_at_start(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::AuthenticationFailed(reason) if self.sessions.is_empty() => Some(reason),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Progress callback for reporting engine status.
pub trait EngineObserver: Send + Sync {
    /// Called on every state transition.
    fn state_changed(&self, state: EngineState);
    /// Called once a session has its quota.
    fn session_started(&self, id: SessionId, quota: usize, total: usize);
    /// Called after every lookup attempt.
    fn record_attempted(&self, id: RecordId, record: &Record, attempt: u32, outcome: &AttemptOutcome);
    /// Called when a session ends.
    fn session_finished(&self, report: &SessionReport);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl EngineObserver for SilentObserver {
    fn state_changed(&self, _state: EngineState) {}
    fn session_started(&self, _id: SessionId, _quota: usize, _total: usize) {}
    fn record_attempted(&self, _id: RecordId, _record: &Record, _attempt: u32, _outcome: &AttemptOutcome) {}
    fn session_finished(&self, _report: &SessionReport) {}
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Per-session counters.
#[derive(Debug, Default)]
struct Tally {
    processed: usize,
    resolved: usize,
    failed: usize,
    consecutive_failures: u32,
}

/// Drives a lookup driver over a checkpointed batch.
pub struct Engine<S, D> {
    config: EnrichConfig,
    scheduler: RetryScheduler,
    batch: CheckpointedBatch<S>,
    driver: D,
    credentials: Credentials,
    cancel: CancellationToken,
    state: EngineState,
}

impl<S: RecordStore, D: LookupDriver> Engine<S, D> {
    /// Build an engine over an already loaded batch.
    pub fn new(
        config: EnrichConfig,
        batch: Batch,
        store: S,
        driver: D,
        credentials: Credentials,
    ) -> Self {
        Self {
            scheduler: RetryScheduler::new(config.max_retries_per_record),
            config,
            batch: CheckpointedBatch::new(batch, store),
            driver,
            credentials,
            cancel: CancellationToken::new(),
            state: EngineState::Idle,
        }
    }

    /// Stop at the next record boundary or wait once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn batch(&self) -> &Batch {
        self.batch.batch()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run sessions until the batch needs nothing more, login fails, or shutdown.
    ///
    /// Only store write failures are returned as errors. Everything else ends
    /// up in the report's outcome.
    #[instrument(skip_all, fields(records = self.batch.batch().len()))]
    pub async fn run(&mut self, observer: &dyn EngineObserver) -> Result<RunReport> {
        let mut sessions: Vec<SessionReport> = Vec::new();

        let outcome = loop {
            if self.cancel.is_cancelled() {
                break RunOutcome::Cancelled;
            }

            let quota = self
                .scheduler
                .quota(self.config.max_records_per_run, self.batch.batch());
            if quota == 0 {
                info!("no records left to enrich");
                break if sessions.is_empty() {
                    RunOutcome::NothingToDo
                } else {
                    RunOutcome::Finished
                };
            }

            self.transition(EngineState::Authenticating, observer);
            if let Err(e) = self.driver.authenticate(&self.credentials).await {
                error!(error = %e, "failed to log in to the lookup source");
                self.driver.close().await;
                break RunOutcome::AuthenticationFailed(e.to_string());
            }
            info!("logged in");

            self.transition(EngineState::Running, observer);
            let report = self.run_session(quota, observer).await;
            self.driver.close().await;
            let report = report?;
            observer.session_finished(&report);

            let end = report.end.clone();
            sessions.push(report);

            // An anomaly, breaker trip, or expiry never finishes a run, even on
            // the session's last quota unit.
            match end {
                SessionEnd::Cancelled => break RunOutcome::Cancelled,
                SessionEnd::QuotaReached | SessionEnd::PassesExhausted => {
                    break RunOutcome::Finished;
                }
                _ if !self.config.restart_sessions => break RunOutcome::Incomplete,
                _ => {}
            }

            warn!(
                reason = ?end,
                cooldown_secs = self.config.cooldown.as_secs(),
                "session cut short, restarting after cooldown"
            );
            self.transition(EngineState::Cooldown, observer);
            if !self.pause(self.config.cooldown).await {
                break RunOutcome::Cancelled;
            }
        };

        self.transition(EngineState::Finished, observer);
        info!(
            outcome = ?outcome,
            sessions = sessions.len(),
            resolved = self.batch.batch().resolved_count(),
            total = self.batch.batch().len(),
            "run finished"
        );

        Ok(RunReport { outcome, sessions })
    }

    /// One logged-in session: fresh anomaly state, passes until an end condition.
    #[instrument(skip_all, fields(session = tracing::field::Empty, quota = quota))]
    async fn run_session(
        &mut self,
        quota: usize,
        observer: &dyn EngineObserver,
    ) -> Result<SessionReport> {
        let id = SessionId::new();
        tracing::Span::current().record("session", tracing::field::display(id));
        let started_at = Utc::now();
        let total = self.batch.batch().len();

        info!("{quota}/{total} records to enrich");
        observer.session_started(id, quota, total);

        let mut detector = AnomalyDetector::new();
        let mut tally = Tally::default();
        let end = self.sweep(quota, &mut detector, &mut tally, observer).await?;

        info!(
            processed = tally.processed,
            resolved = tally.resolved,
            failed = tally.failed,
            end = ?end,
            "session ended"
        );

        Ok(SessionReport {
            id,
            started_at,
            quota,
            processed: tally.processed,
            resolved: tally.resolved,
            failed: tally.failed,
            end,
        })
    }

    async fn sweep(
        &mut self,
        quota: usize,
        detector: &mut AnomalyDetector,
        tally: &mut Tally,
        observer: &dyn EngineObserver,
    ) -> Result<SessionEnd> {
        for pass in self.scheduler.passes() {
            debug!(pass, "starting pass");

            for index in 0..self.batch.batch().len() {
                if self.cancel.is_cancelled() {
                    return Ok(SessionEnd::Cancelled);
                }

                let id = RecordId(index);
                let query = match self.batch.record(id) {
                    Some(record) if self.scheduler.is_eligible(record, pass) => {
                        record.query(self.config.include_company_in_query)
                    }
                    _ => continue,
                };

                if !self.pause(self.config.inter_attempt_delay).await {
                    return Ok(SessionEnd::Cancelled);
                }

                let attempt = self.batch.mark_attempted(id)?;
                tally.processed += 1;

                let result = match self.driver.lookup(&query).await {
                    Ok(value) if value.trim().is_empty() => {
                        Err(ContactFillError::lookup("source returned an empty value"))
                    }
                    Ok(value) => Ok(value.trim().to_string()),
                    Err(e) => Err(e),
                };

                match result {
                    Ok(value) => {
                        tally.consecutive_failures = 0;

                        if detector.observe(&value) == Observation::Duplicate {
                            warn!(
                                record = %query.name,
                                attempt,
                                pass,
                                value = %value,
                                "duplicate result, the source is likely throttling lookups"
                            );
                            if !self.config.discard_ambiguous_result {
                                self.batch.mark_resolved(id, value.clone())?;
                            }
                            self.notify(observer, id, attempt, AttemptOutcome::Duplicate(value.clone()));
                            return Ok(SessionEnd::Anomaly { record: id, value });
                        }

                        self.batch.mark_resolved(id, value.clone())?;
                        tally.resolved += 1;
                        info!(record = %query.name, attempt, pass, value = %value, "resolved");
                        self.notify(observer, id, attempt, AttemptOutcome::Resolved(value));
                    }
                    Err(e) if e.is_session_expired() => {
                        tally.failed += 1;
                        warn!(record = %query.name, attempt, pass, error = %e, "lookup session expired");
                        self.notify(observer, id, attempt, AttemptOutcome::Failed(e.to_string()));
                        return Ok(SessionEnd::SessionExpired);
                    }
                    Err(e) => {
                        tally.failed += 1;
                        tally.consecutive_failures += 1;
                        warn!(record = %query.name, attempt, pass, error = %e, "lookup failed");
                        self.notify(observer, id, attempt, AttemptOutcome::Failed(e.to_string()));
                    }
                }

                if tally.processed >= quota {
                    return Ok(SessionEnd::QuotaReached);
                }

                let threshold = self.config.max_consecutive_failures;
                if threshold > 0 && tally.consecutive_failures >= threshold {
                    warn!(failures = tally.consecutive_failures, "too many consecutive lookup failures");
                    return Ok(SessionEnd::CircuitOpen {
                        failures: tally.consecutive_failures,
                    });
                }
            }
        }

        Ok(SessionEnd::PassesExhausted)
    }

    fn notify(&self, observer: &dyn EngineObserver, id: RecordId, attempt: u32, outcome: AttemptOutcome) {
        if let Some(record) = self.batch.record(id) {
            observer.record_attempted(id, record, attempt, &outcome);
        }
    }

    /// Timed wait that gives up early on cancellation. Returns false if cancelled.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn transition(&mut self, state: EngineState, observer: &dyn EngineObserver) {
        debug!(from = ?self.state, to = ?state, "engine state");
        self.state = state;
        observer.state_changed(state);
    }
}
