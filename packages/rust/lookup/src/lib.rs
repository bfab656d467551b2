//! Lookup source access: login and per-record value extraction.
//!
//! This crate provides:
//! - [`LookupDriver`]: the engine's view of the lookup source
//! - [`HttpLookupDriver`]: form login plus search/profile scraping over HTTP
//! - [`SiteProfile`]: endpoints and selectors for one source

pub mod http;
pub mod profile;

use async_trait::async_trait;

use contactfill_shared::{Credentials, LookupQuery, Result};

pub use http::HttpLookupDriver;
pub use profile::SiteProfile;

/// One authenticated connection to the lookup source.
///
/// Both operations are long-running and fallible. The engine never issues
/// two calls concurrently.
#[async_trait]
pub trait LookupDriver: Send {
    /// Open a fresh connection and log in, discarding any previous one.
    ///
    /// `Err(ContactFillError::Auth)` means the credentials were refused.
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<()>;

    /// Perform one enrichment attempt for `query`.
    ///
    /// `Err(ContactFillError::SessionExpired)` asks the caller to log in again;
    /// any other error is a failure of this attempt only.
    async fn lookup(&mut self, query: &LookupQuery) -> Result<String>;

    /// Tear down the connection.
    async fn close(&mut self) {}
}
