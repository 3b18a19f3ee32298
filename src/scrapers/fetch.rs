use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::error::FetchError;
use super::traits::PageFetcher;

/// Encoding of the listing site; used when the response names no charset
pub const SITE_ENCODING: &str = "windows-1251";

/// Plain HTTP GET fetcher for the listing site
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(client))
    }

    /// Fetch through a preconfigured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text_with_charset(SITE_ENCODING)
            .await
            .map_err(|source| FetchError::Body {
                url: url.to_string(),
                source,
            })?;

        debug!("Downloaded {} chars of HTML", body.chars().count());
        Ok(body)
    }

    fn source_name(&self) -> &'static str {
        "ru09"
    }
}
