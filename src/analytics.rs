//! Average price per square metre over time, the series behind the price
//! charts.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::models::Advert;

/// How far back the charts look
pub const DEFAULT_WINDOW_DAYS: u64 = 180;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    /// Total price of the day's adverts over their total area
    pub price_per_sqm: f64,
}

/// Start of the default chart window ending at `today`
pub fn default_since(today: NaiveDate) -> NaiveDate {
    window_start(today, DEFAULT_WINDOW_DAYS)
}

/// Start of a window of `days` ending at `today`
pub fn window_start(today: NaiveDate, days: u64) -> NaiveDate {
    today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

/// One point per publication date, sorted by date.
///
/// The average is weighted by area, so large flats count proportionally more.
/// Days whose adverts have no usable area are left out.
pub fn price_series<'a>(adverts: impl IntoIterator<Item = &'a Advert>) -> Vec<PricePoint> {
    let mut totals: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for advert in adverts {
        let (price, area) = totals.entry(advert.publication_date).or_default();
        *price += advert.price;
        *area += advert.area;
    }

    totals
        .into_iter()
        .filter(|(_, (_, area))| *area > 0.0)
        .map(|(date, (price, area))| PricePoint {
            date,
            price_per_sqm: price / area,
        })
        .collect()
}
