//! Realty Scout - ingestion of real-estate adverts from the ru09 listings
//! into a local store, plus the price series built on top of them.

pub mod analytics;
pub mod ingest;
pub mod models;
pub mod scrapers;
pub mod store;
