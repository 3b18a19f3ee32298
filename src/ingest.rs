//! Crawl loop: fetch a results page, parse it, upsert its adverts, follow the
//! pager. One page is fully saved before the next one is requested.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::Advert;
use crate::scrapers::error::FetchError;
use crate::scrapers::page::{AdvertListParser, ParsedPage};
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::CrawlParams;
use crate::scrapers::AdvertParser;
use crate::store::{AdvertStore, StoreError};

/// Fatal crawl errors. Unparseable adverts are not among them.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a crawl ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// The pager had no next link
    #[default]
    LastPage,
    /// New-only mode saw a page without unseen adverts
    NoNewAdverts,
    /// The cancellation token fired
    Cancelled,
}

/// Totals for one crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    pub pages: usize,
    pub parsed: usize,
    pub skipped: usize,
    pub created: usize,
    pub updated: usize,
    pub stop_reason: StopReason,
}

/// Result of upserting one advert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

enum CrawlState {
    Fetching { url: String },
    Parsing { url: String, html: String },
    Saving { url: String, page: ParsedPage },
    Paginating { next_page: Option<String>, created: usize },
    Done(StopReason),
}

/// Drives the crawl against one fetcher and one store
pub struct Ingestor<'a> {
    fetcher: &'a dyn PageFetcher,
    store: &'a dyn AdvertStore,
    params: CrawlParams,
    parser: AdvertListParser,
    cancel: CancellationToken,
}

impl<'a> Ingestor<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, store: &'a dyn AdvertStore, params: CrawlParams) -> Self {
        let parser = AdvertListParser::new(AdvertParser::new(params.extraction_mode));
        Self {
            fetcher,
            store,
            params,
            parser,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a custom page parser (e.g. with a fixed "today")
    pub fn with_parser(mut self, parser: AdvertListParser) -> Self {
        self.parser = parser;
        self
    }

    /// Stop the crawl between pages when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Crawl from the start page until the pager runs out, new-only mode
    /// stops it, or the crawl is cancelled
    pub async fn run(&self) -> Result<CrawlReport, IngestError> {
        let mut report = CrawlReport::default();
        let mut state = CrawlState::Fetching {
            url: self.params.start_url(),
        };

        info!(
            "Starting {} crawl from {} (new only: {})",
            self.fetcher.source_name(),
            self.params.start_url(),
            self.params.new_only
        );

        loop {
            state = match state {
                CrawlState::Fetching { url } => {
                    info!("parsing adverts on {}", url);
                    match self.fetch_page(&url).await? {
                        Some(html) => CrawlState::Parsing { url, html },
                        None => CrawlState::Done(StopReason::Cancelled),
                    }
                }
                CrawlState::Parsing { url, html } => {
                    let page = self.parser.parse_page(&html);
                    report.pages += 1;
                    report.parsed += page.adverts.len();
                    report.skipped += page.skipped.len();
                    CrawlState::Saving { url, page }
                }
                CrawlState::Saving { url, page } => {
                    let mut created = 0;
                    let mut updated = 0;
                    for mut advert in page.adverts {
                        match self.save_advert(&mut advert).await? {
                            SaveOutcome::Created => created += 1,
                            SaveOutcome::Updated => updated += 1,
                        }
                    }
                    info!(
                        "{}: {} new, {} updated, {} skipped",
                        url,
                        created,
                        updated,
                        page.skipped.len()
                    );
                    report.created += created;
                    report.updated += updated;
                    CrawlState::Paginating {
                        next_page: page.next_page,
                        created,
                    }
                }
                CrawlState::Paginating { next_page, created } => {
                    if self.params.new_only && created == 0 {
                        info!("no new adverts on this page, stopping");
                        CrawlState::Done(StopReason::NoNewAdverts)
                    } else if let Some(href) = next_page {
                        if self.pause(self.params.page_delay).await {
                            CrawlState::Fetching {
                                url: self.params.resolve(&href),
                            }
                        } else {
                            CrawlState::Done(StopReason::Cancelled)
                        }
                    } else {
                        CrawlState::Done(StopReason::LastPage)
                    }
                }
                CrawlState::Done(reason) => {
                    report.stop_reason = reason;
                    break;
                }
            };
        }

        info!(
            "Crawl finished ({:?}): {} pages, {} new, {} updated, {} skipped",
            report.stop_reason, report.pages, report.created, report.updated, report.skipped
        );
        Ok(report)
    }

    /// Upsert one advert by its external id. A known advert keeps its store id
    /// so it is overwritten rather than duplicated.
    pub async fn save_advert(&self, advert: &mut Advert) -> Result<SaveOutcome, StoreError> {
        let outcome = match self.store.find_by_external_id(&advert.external_id).await? {
            Some(stored) => {
                debug!("advert with external id {} found", advert.external_id);
                advert.id = stored.id;
                SaveOutcome::Updated
            }
            None => {
                debug!("new advert {} found", advert.external_id);
                SaveOutcome::Created
            }
        };
        self.store.save(advert).await?;
        Ok(outcome)
    }

    /// Fetch with exponential backoff on transient failures.
    /// `None` means the crawl was cancelled first.
    async fn fetch_page(&self, url: &str) -> Result<Option<String>, FetchError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.params.retry_delay)
            .with_max_delay(self.params.retry_delay.saturating_mul(16))
            .with_max_times(self.params.fetch_attempts.saturating_sub(1));

        let fetch = || async { self.fetcher.fetch(url).await };
        let retrying = fetch
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .when(FetchError::is_transient)
            .notify(|err: &FetchError, delay: Duration| {
                warn!(
                    "fetch failed, retrying in {}ms: {}",
                    delay.as_millis(),
                    err
                );
            });

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(None),
            result = retrying => result.map(Some),
        }
    }

    /// Politeness delay. Returns false if cancelled while waiting.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("crawl cancelled");
                false
            }
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
