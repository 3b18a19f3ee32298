use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Store-assigned primary key of a persisted advert
pub type AdvertId = i64;

/// One scraped real-estate listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Advert {
    /// Assigned by the store on first insert
    pub id: Option<AdvertId>,
    /// The site's own listing id, taken from the listing link
    pub external_id: String,
    /// Market category as printed by the site, e.g. "вторичное"
    pub category: String,
    /// Normalized district name, e.g. "кировский"
    pub district: String,
    pub address: String,
    pub floor_number: u32,
    pub floor_count: u32,
    /// Total area in square metres
    pub area: f64,
    /// `None` for single-room listings
    pub room_count: Option<u32>,
    /// Price in roubles
    pub price: f64,
    pub publication_date: NaiveDate,
}

/// Query over stored adverts. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdvertFilter {
    pub category: Option<String>,
    pub district: Option<String>,
    pub floor_number: Option<u32>,
    pub room_count: Option<u32>,
    /// Inclusive lower bound on the publication date
    pub published_since: Option<NaiveDate>,
}

/// Distinct values available for building filter menus
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterOptions {
    pub categories: Vec<String>,
    pub districts: Vec<String>,
    pub floor_numbers: Vec<u32>,
    pub room_counts: Vec<u32>,
}
