//! Endpoints and selectors describing one lookup source.

use scraper::Selector;
use url::Url;

use contactfill_shared::{ContactFillError, Result, SourceConfig};

/// Parsed, ready-to-use view of a `[source]` config section.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub base_url: Url,
    pub login_path: String,
    pub identity_field: String,
    pub secret_field: String,
    pub logged_in: Selector,
    pub search_path: String,
    pub search_param: String,
    pub result_link: Selector,
    pub contact_link: Selector,
}

impl SiteProfile {
    /// Validate URLs and compile selectors from config.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ContactFillError::config(format!("invalid base_url '{}': {e}", config.base_url))
        })?;

        Ok(Self {
            base_url,
            login_path: config.login_path.clone(),
            identity_field: config.identity_field.clone(),
            secret_field: config.secret_field.clone(),
            logged_in: parse_selector("logged_in_selector", &config.logged_in_selector)?,
            search_path: config.search_path.clone(),
            search_param: config.search_param.clone(),
            result_link: parse_selector("result_link_selector", &config.result_link_selector)?,
            contact_link: parse_selector("contact_link_selector", &config.contact_link_selector)?,
        })
    }

    pub fn login_url(&self) -> Result<Url> {
        self.join(&self.login_path)
    }

    /// Search page URL for the given terms.
    pub fn search_url(&self, terms: &str) -> Result<Url> {
        let mut url = self.join(&self.search_path)?;
        url.query_pairs_mut().append_pair(&self.search_param, terms);
        Ok(url)
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ContactFillError::config(format!("invalid path '{path}': {e}")))
    }
}

fn parse_selector(key: &str, css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ContactFillError::config(format!("invalid {key} '{css}': {e}")))
}
