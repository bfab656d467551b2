//! Shared types, error model, and configuration for ContactFill.
//!
//! This crate is the foundation depended on by all other ContactFill crates.
//! It provides:
//! - [`ContactFillError`]: the unified error type
//! - Domain types ([`Record`], [`Batch`], [`RecordId`], [`LookupQuery`], [`Credentials`])
//! - Configuration ([`AppConfig`], [`EnrichConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnrichConfig, EnrichmentSection, SourceConfig, StoreConfig, config_dir,
    config_file_path, load_config, load_config_from, resolve_credentials, validate_config,
};
pub use error::{ContactFillError, Result};
pub use types::{Batch, Credentials, LookupQuery, Record, RecordId, SessionId};
