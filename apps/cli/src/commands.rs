//! CLI flags, tracing setup, and the enrich run.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use contactfill_core::{Engine, RetryScheduler, RunOutcome, RunReport};
use contactfill_lookup::{HttpLookupDriver, SiteProfile};
use contactfill_shared::{
    AppConfig, EnrichConfig, load_config, load_config_from, resolve_credentials, validate_config,
};
use contactfill_storage::{CsvRecordStore, RecordStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::progress::CliProgress;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ContactFill: fill in missing contact emails, one polite lookup at a time.
#[derive(Parser)]
#[command(
    name = "contactfill",
    version,
    about = "Enrich a connections CSV with email addresses looked up from the source site.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// CSV file to enrich in place (defaults to store.path from config).
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Config file (defaults to ~/.contactfill/contactfill.toml).
    #[arg(short, long, env = "CONTACTFILL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Login identity for the source site.
    #[arg(long, env = "CONTACTFILL_IDENTITY")]
    pub identity: Option<String>,

    /// Milliseconds to wait before each lookup.
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Lookups allowed per session.
    #[arg(long)]
    pub max_records: Option<usize>,

    /// Attempts allowed per record across all runs.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "contactfill=info",
        1 => "contactfill=debug",
        _ => "contactfill=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Merge flags over the config file, load the batch, and run the engine.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    apply_overrides(&mut config, &cli);
    validate_config(&config)?;

    let store = CsvRecordStore::new(&config.store.path);
    let batch = store.load()?;

    let enrich = EnrichConfig::from(&config);
    let pending = RetryScheduler::new(enrich.max_retries_per_record).quota(usize::MAX, &batch);
    info!(
        path = %store.path().display(),
        "{pending}/{} records to enrich",
        batch.len()
    );
    if pending == 0 {
        println!("Nothing to enrich in {}.", store.path().display());
        return Ok(());
    }

    let credentials = resolve_credentials(&config)?;
    let profile = SiteProfile::from_config(&config.source)?;
    let driver = HttpLookupDriver::new(
        profile,
        Duration::from_secs(config.source.request_timeout_secs),
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current lookup");
            on_signal.cancel();
        }
    });

    let progress = CliProgress::new();
    let mut engine =
        Engine::new(enrich, batch, store, driver, credentials).with_cancellation(cancel);
    let report = engine.run(&progress).await?;

    print_summary(&report, engine.batch().resolved_count(), engine.batch().len());

    if let Some(reason) = report.refused_at_start() {
        return Err(eyre!(
            "could not log in to {}: {reason}",
            config.source.base_url
        ));
    }
    if let RunOutcome::AuthenticationFailed(reason) = &report.outcome {
        error!(%reason, "login refused on restart, progress so far is saved");
    }
    Ok(())
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(input) = &cli.input {
        config.store.path = input.to_string_lossy().into_owned();
    }
    if let Some(identity) = &cli.identity {
        config.source.identity = Some(identity.clone());
    }
    if let Some(delay) = cli.delay_ms {
        config.enrichment.inter_attempt_delay_ms = delay;
    }
    if let Some(max) = cli.max_records {
        config.enrichment.max_records_per_run = max;
    }
    if let Some(max) = cli.max_retries {
        config.enrichment.max_retries_per_record = max;
    }
}

fn print_summary(report: &RunReport, resolved: usize, total: usize) {
    let outcome = match &report.outcome {
        RunOutcome::Finished => "finished",
        RunOutcome::NothingToDo => "nothing to do",
        RunOutcome::Incomplete => "stopped early",
        RunOutcome::AuthenticationFailed(_) => "login failed",
        RunOutcome::Cancelled => "interrupted",
    };

    println!();
    println!("  Enrichment {outcome}");
    println!("  Sessions:  {}", report.sessions.len());
    println!("  Lookups:   {}", report.processed());
    println!("  Found:     {}", report.resolved());
    println!("  Resolved:  {resolved}/{total}");
    println!();
}
