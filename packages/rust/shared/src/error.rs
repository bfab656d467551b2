//! Error types for ContactFill.
//!
//! Library crates use [`ContactFillError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ContactFill operations.
#[derive(Debug, thiserror::Error)]
pub enum ContactFillError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The record batch could not be read or written.
    #[error("store error: {message}")]
    Store { message: String },

    /// Logging in to the lookup source failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A single record's lookup attempt failed.
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// The lookup source dropped the authenticated session.
    #[error("lookup session expired: {0}")]
    SessionExpired(String),

    /// Network/HTTP error talking to the lookup source.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or value extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ContactFillError>;

impl ContactFillError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a store error from any displayable message.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store {
            message: msg.into(),
        }
    }

    /// Create a lookup failure from any displayable message.
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the lookup source wants a fresh login before continuing.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }
}
