use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the advert parser reacts to a bad field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMode {
    /// Stop at the first field that can not be extracted
    #[default]
    FailFast,
    /// Try every field and report all failures together
    CollectAll,
}

/// Crawl parameters for the ru09 realty listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlParams {
    /// Scheme and host of the listing site
    pub base_url: String,
    /// First results page, relative to `base_url`
    pub start_path: String,
    /// Pause between two page fetches
    pub page_delay: Duration,
    /// Total attempts per page fetch, including the first one
    pub fetch_attempts: usize,
    /// Backoff before the first retry; doubles on each further retry
    pub retry_delay: Duration,
    /// HTTP request timeout
    pub timeout: Duration,
    /// Stop once a page contributes no previously unseen adverts
    pub new_only: bool,
    pub extraction_mode: ExtractionMode,
}

impl CrawlParams {
    /// Absolute URL of the first results page
    pub fn start_url(&self) -> String {
        self.resolve(&self.start_path)
    }

    /// Resolve a pager link (usually site-relative) against the base URL
    pub fn resolve(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{}", self.base_url.trim_end_matches('/'), href)
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), href)
        }
    }
}

impl Default for CrawlParams {
    fn default() -> Self {
        Self {
            base_url: "http://www.tomsk.ru09.ru".to_string(),
            start_path: "/realty/?type=1&otype=1&listview=1&perpage=50".to_string(),
            page_delay: Duration::from_secs(1),
            fetch_attempts: 3,
            retry_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
            new_only: false,
            extraction_mode: ExtractionMode::FailFast,
        }
    }
}
