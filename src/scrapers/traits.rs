use async_trait::async_trait;

use super::error::FetchError;

/// Source of raw results pages.
///
/// The crawler only ever asks for decoded HTML; implementations own the
/// transport and the site's character encoding.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page and return its decoded body
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Name of the source, for logs
    fn source_name(&self) -> &'static str;
}
