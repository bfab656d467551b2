//! Application configuration for ContactFill.
//!
//! User config lives at `~/.contactfill/contactfill.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ContactFillError, Result};
use crate::types::Credentials;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contactfill.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contactfill";

// ---------------------------------------------------------------------------
// Config structs (matching contactfill.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine pacing and retry budget.
    #[serde(default)]
    pub enrichment: EnrichmentSection,

    /// Lookup source endpoints, selectors and login identity.
    #[serde(default)]
    pub source: SourceConfig,

    /// Record store location.
    #[serde(default)]
    pub store: StoreConfig,
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSection {
    /// Wait before every lookup, in ms.
    #[serde(default = "default_delay_ms")]
    pub inter_attempt_delay_ms: u64,

    /// Most records attempted in one session.
    #[serde(default = "default_max_records")]
    pub max_records_per_run: usize,

    /// Most lookup attempts a single record ever gets.
    #[serde(default = "default_max_retries")]
    pub max_retries_per_record: u32,

    /// Wait between a cut-short session and the next one, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Leave a duplicate result unwritten when the anomaly detector fires.
    #[serde(default = "default_true")]
    pub discard_ambiguous_result: bool,

    /// Consecutive lookup failures that end a session. 0 disables the breaker.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Start a new session after a cut-short one.
    #[serde(default = "default_true")]
    pub restart_sessions: bool,

    /// Append the company to the search terms.
    #[serde(default)]
    pub include_company_in_query: bool,
}

impl Default for EnrichmentSection {
    fn default() -> Self {
        Self {
            inter_attempt_delay_ms: default_delay_ms(),
            max_records_per_run: default_max_records(),
            max_retries_per_record: default_max_retries(),
            cooldown_secs: default_cooldown_secs(),
            discard_ambiguous_result: true,
            max_consecutive_failures: default_max_consecutive_failures(),
            restart_sessions: true,
            include_company_in_query: false,
        }
    }
}

fn default_delay_ms() -> u64 {
    3000
}
fn default_max_records() -> usize {
    100
}
fn default_max_retries() -> u32 {
    10
}
fn default_cooldown_secs() -> u64 {
    30
}
fn default_max_consecutive_failures() -> u32 {
    5
}
fn default_true() -> bool {
    true
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root URL of the lookup source.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the login form endpoint.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Form field carrying the identity.
    #[serde(default = "default_identity_field")]
    pub identity_field: String,

    /// Form field carrying the secret.
    #[serde(default = "default_secret_field")]
    pub secret_field: String,

    /// CSS selector only present once logged in.
    #[serde(default = "default_logged_in_selector")]
    pub logged_in_selector: String,

    /// Path of the connection search page.
    #[serde(default = "default_search_path")]
    pub search_path: String,

    /// Query parameter carrying the search terms.
    #[serde(default = "default_search_param")]
    pub search_param: String,

    /// CSS selector of the first search result link.
    #[serde(default = "default_result_link_selector")]
    pub result_link_selector: String,

    /// CSS selector of the contact link on a profile page.
    #[serde(default = "default_contact_link_selector")]
    pub contact_link_selector: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Login identity. Can also come from `--identity` / `CONTACTFILL_IDENTITY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,

    /// Name of the env var holding the secret (never store the secret itself).
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_path: default_login_path(),
            identity_field: default_identity_field(),
            secret_field: default_secret_field(),
            logged_in_selector: default_logged_in_selector(),
            search_path: default_search_path(),
            search_param: default_search_param(),
            result_link_selector: default_result_link_selector(),
            contact_link_selector: default_contact_link_selector(),
            request_timeout_secs: default_request_timeout(),
            identity: None,
            secret_env: default_secret_env(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.linkedin.com".into()
}
fn default_login_path() -> String {
    "/uas/login-submit".into()
}
fn default_identity_field() -> String {
    "session_key".into()
}
fn default_secret_field() -> String {
    "session_password".into()
}
fn default_logged_in_selector() -> String {
    "#mynetwork-tab-icon".into()
}
fn default_search_path() -> String {
    "/mynetwork/invite-connect/connections/".into()
}
fn default_search_param() -> String {
    "keywords".into()
}
fn default_result_link_selector() -> String {
    "a.mn-connection-card__link".into()
}
fn default_contact_link_selector() -> String {
    ".ci-email a[href^='mailto:']".into()
}
fn default_request_timeout() -> u64 {
    20
}
fn default_secret_env() -> String {
    "CONTACTFILL_SECRET".into()
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the CSV batch, relative to the working directory.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "Connections.csv".into()
}

// ---------------------------------------------------------------------------
// Enrich config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime engine configuration. Immutable once the engine is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichConfig {
    /// Wait before every lookup.
    pub inter_attempt_delay: Duration,
    /// Most records attempted in one session.
    pub max_records_per_run: usize,
    /// Per-record pass ceiling.
    pub max_retries_per_record: u32,
    /// Wait between a cut-short session and the next.
    pub cooldown: Duration,
    /// Leave a duplicate result unwritten when the anomaly detector fires.
    pub discard_ambiguous_result: bool,
    /// Consecutive lookup failures that end a session (0 = never).
    pub max_consecutive_failures: u32,
    /// Start a new session after a cut-short one.
    pub restart_sessions: bool,
    /// Append the company to the search terms.
    pub include_company_in_query: bool,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EnrichConfig {
    fn from(config: &AppConfig) -> Self {
        let e = &config.enrichment;
        Self {
            inter_attempt_delay: Duration::from_millis(e.inter_attempt_delay_ms),
            max_records_per_run: e.max_records_per_run,
            max_retries_per_record: e.max_retries_per_record,
            cooldown: Duration::from_secs(e.cooldown_secs),
            discard_ambiguous_result: e.discard_ambiguous_result,
            max_consecutive_failures: e.max_consecutive_failures,
            restart_sessions: e.restart_sessions,
            include_company_in_query: e.include_company_in_query,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contactfill/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContactFillError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contactfill/contactfill.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ContactFillError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ContactFillError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject settings the engine cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.enrichment.max_retries_per_record == 0 {
        return Err(ContactFillError::config(
            "max_retries_per_record must be at least 1",
        ));
    }
    url::Url::parse(&config.source.base_url).map_err(|e| {
        ContactFillError::config(format!("invalid base_url '{}': {e}", config.source.base_url))
    })?;
    Ok(())
}

/// Resolve login credentials: identity from config, secret from the configured env var.
pub fn resolve_credentials(config: &AppConfig) -> Result<Credentials> {
    let identity = config
        .source
        .identity
        .clone()
        .filter(|i| !i.trim().is_empty())
        .ok_or_else(|| {
            ContactFillError::config(
                "no login identity configured. Pass --identity or set source.identity",
            )
        })?;

    let var_name = &config.source.secret_env;
    match std::env::var(var_name) {
        Ok(secret) if !secret.is_empty() => Ok(Credentials { identity, secret }),
        _ => Err(ContactFillError::config(format!(
            "login secret not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_records_per_run"));
        assert!(toml_str.contains("CONTACTFILL_SECRET"));
        assert!(!toml_str.contains("identity ="));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[enrichment]
max_records_per_run = 25
discard_ambiguous_result = false

[store]
path = "/tmp/people.csv"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.enrichment.max_records_per_run, 25);
        assert!(!config.enrichment.discard_ambiguous_result);
        assert_eq!(config.enrichment.max_retries_per_record, 10);
        assert_eq!(config.store.path, "/tmp/people.csv");
        assert_eq!(config.source.secret_env, "CONTACTFILL_SECRET");
    }

    #[test]
    fn enrich_config_from_app_config() {
        let enrich = EnrichConfig::from(&AppConfig::default());
        assert_eq!(enrich.inter_attempt_delay, Duration::from_millis(3000));
        assert_eq!(enrich.max_records_per_run, 100);
        assert_eq!(enrich.max_retries_per_record, 10);
        assert_eq!(enrich.cooldown, Duration::from_secs(30));
        assert_eq!(enrich.max_consecutive_failures, 5);
        assert!(enrich.discard_ambiguous_result);
        assert!(enrich.restart_sessions);
    }

    #[test]
    fn zero_retry_ceiling_is_rejected() {
        let mut config = AppConfig::default();
        config.enrichment.max_retries_per_record = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_retries_per_record"));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let mut config = AppConfig::default();
        config.source.base_url = "not a url".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn missing_identity_is_a_config_error() {
        let config = AppConfig::default();
        let err = resolve_credentials(&config).unwrap_err();
        assert!(err.to_string().contains("identity"));
    }

    #[test]
    fn missing_secret_is_a_config_error() {
        let mut config = AppConfig::default();
        config.source.identity = Some("me@example.com".into());
        // Use a unique env var name to avoid interfering with other tests
        config.source.secret_env = "CF_TEST_NONEXISTENT_SECRET_12345".into();
        let err = resolve_credentials(&config).unwrap_err();
        assert!(err.to_string().contains("CF_TEST_NONEXISTENT_SECRET_12345"));
    }
}
