pub mod advert;
pub mod error;
pub mod fetch;
pub mod page;
pub mod rules;
pub mod traits;
pub mod types;

pub use advert::AdvertParser;
pub use fetch::HttpFetcher;
pub use page::{AdvertListParser, ParsedPage};
pub use traits::PageFetcher;
pub use types::{CrawlParams, ExtractionMode};
