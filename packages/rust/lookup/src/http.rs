//! HTTP lookup driver: form login, connection search, contact-link extraction.
//!
//! Each [`authenticate`](LookupDriver::authenticate) builds a brand-new client
//! with its own cookie jar, so a restarted session never inherits state from
//! a throttled one.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use contactfill_shared::{ContactFillError, Credentials, LookupQuery, Result};

use crate::LookupDriver;
use crate::profile::SiteProfile;

/// User-Agent string for lookup requests.
const USER_AGENT: &str = concat!("ContactFill/", env!("CARGO_PKG_VERSION"));

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// [`LookupDriver`] that talks to the source over plain HTTP.
pub struct HttpLookupDriver {
    profile: SiteProfile,
    timeout: Duration,
    client: Option<Client>,
}

impl HttpLookupDriver {
    pub fn new(profile: SiteProfile, timeout: Duration) -> Self {
        Self {
            profile,
            timeout,
            client: None,
        }
    }

    fn build_client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(self.timeout)
            .build()
            .map_err(|e| ContactFillError::Network(format!("failed to build HTTP client: {e}")))
    }
}

#[async_trait]
impl LookupDriver for HttpLookupDriver {
    #[instrument(skip_all, fields(identity = %credentials.identity))]
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        self.client = None;
        let client = self.build_client()?;
        let url = self.profile.login_url()?;

        let response = client
            .post(url.as_str())
            .form(&[
                (self.profile.identity_field.as_str(), credentials.identity.as_str()),
                (self.profile.secret_field.as_str(), credentials.secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ContactFillError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContactFillError::Auth(format!("login returned HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ContactFillError::Network(format!("{url}: body read failed: {e}")))?;

        if !contains(&body, &self.profile.logged_in) {
            return Err(ContactFillError::Auth(
                "logged-in marker not found after submitting credentials".into(),
            ));
        }

        info!("logged in to lookup source");
        self.client = Some(client);
        Ok(())
    }

    #[instrument(skip_all, fields(query = %query))]
    async fn lookup(&mut self, query: &LookupQuery) -> Result<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ContactFillError::SessionExpired("not logged in".into()))?;

        let search_url = self.profile.search_url(&query.search_terms())?;
        let search_page = fetch(client, &search_url).await?;
        let profile_url = first_link(&search_page, &self.profile.result_link, &search_url)
            .ok_or_else(|| ContactFillError::lookup(format!("no search result for {query}")))?;

        debug!(%profile_url, "following first search result");
        let profile_page = fetch(client, &profile_url).await?;
        let href = first_href(&profile_page, &self.profile.contact_link)
            .ok_or_else(|| ContactFillError::lookup(format!("no contact link for {query}")))?;

        extract_email(&href)
    }

    async fn close(&mut self) {
        self.client = None;
    }
}

// ---------------------------------------------------------------------------
// Page fetching and extraction
// ---------------------------------------------------------------------------

/// GET a page body, mapping auth-style statuses to session expiry.
async fn fetch(client: &Client, url: &Url) -> Result<String> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| ContactFillError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ContactFillError::SessionExpired(format!("{url}: HTTP {status}")));
    }
    if !status.is_success() {
        return Err(ContactFillError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| ContactFillError::Network(format!("{url}: body read failed: {e}")))
}

fn contains(html: &str, selector: &Selector) -> bool {
    Html::parse_document(html).select(selector).next().is_some()
}

fn first_href(html: &str, selector: &Selector) -> Option<String> {
    Html::parse_document(html)
        .select(selector)
        .find_map(|el| el.value().attr("href"))
        .map(|href| href.trim().to_string())
}

/// First matching link, resolved against the page URL.
fn first_link(html: &str, selector: &Selector, base: &Url) -> Option<Url> {
    first_href(html, selector).and_then(|href| base.join(&href).ok())
}

/// Strip the `mailto:` scheme and any query, then check the address shape.
fn extract_email(href: &str) -> Result<String> {
    let address = href
        .strip_prefix("mailto:")
        .unwrap_or(href)
        .split('?')
        .next()
        .unwrap_or_default()
        .trim();

    if EMAIL_PATTERN.is_match(address) {
        Ok(address.to_string())
    } else {
        Err(ContactFillError::parse(format!(
            "contact link '{href}' does not hold an email address"
        )))
    }
}
