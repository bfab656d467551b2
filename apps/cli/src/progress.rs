//! Terminal progress for enrich runs.

use std::time::Duration;

use contactfill_core::{AttemptOutcome, EngineObserver, EngineState, SessionEnd, SessionReport};
use contactfill_shared::{Record, RecordId, SessionId};
use indicatif::{ProgressBar, ProgressStyle};

/// Engine observer drawing an indicatif bar per session.
pub(crate) struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub(crate) fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl EngineObserver for CliProgress {
    fn state_changed(&self, state: EngineState) {
        match state {
            EngineState::Idle => {}
            EngineState::Authenticating => self.bar.set_message("Logging in"),
            EngineState::Running => self.bar.set_message("Looking up"),
            EngineState::Cooldown => self.bar.set_message("Cooling down before a new session"),
            EngineState::Finished => self.bar.finish_and_clear(),
        }
    }

    fn session_started(&self, _id: SessionId, quota: usize, _total: usize) {
        self.bar.set_length(quota as u64);
        self.bar.set_position(0);
    }

    fn record_attempted(&self, _id: RecordId, record: &Record, attempt: u32, outcome: &AttemptOutcome) {
        self.bar.inc(1);
        let name = record.display_name();
        let msg = match outcome {
            AttemptOutcome::Resolved(value) => format!("{name}: {value}"),
            AttemptOutcome::Duplicate(value) => format!("{name}: repeated {value}"),
            AttemptOutcome::Failed(_) => format!("{name}: not found (attempt {attempt})"),
        };
        self.bar.set_message(msg);
    }

    fn session_finished(&self, report: &SessionReport) {
        let reason = match &report.end {
            SessionEnd::QuotaReached | SessionEnd::PassesExhausted => return,
            SessionEnd::Anomaly { value, .. } => format!("source repeated {value}"),
            SessionEnd::CircuitOpen { failures } => format!("{failures} lookups failed in a row"),
            SessionEnd::SessionExpired => "login expired".to_string(),
            SessionEnd::Cancelled => "interrupted".to_string(),
        };
        self.bar.println(format!(
            "  session ended after {}/{} lookups: {reason}",
            report.processed, report.quota
        ));
    }
}
