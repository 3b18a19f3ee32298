//! Locale rules for the listing text: Russian month names in the genitive
//! case and the district names as they appear in "в ... районе".

use super::error::{UnrecognizedDistrictError, UnrecognizedMonthError};

const MONTHS: [(&str, u32); 12] = [
    ("января", 1),
    ("февраля", 2),
    ("марта", 3),
    ("апреля", 4),
    ("мая", 5),
    ("июня", 6),
    ("июля", 7),
    ("августа", 8),
    ("сентября", 9),
    ("октября", 10),
    ("ноября", 11),
    ("декабря", 12),
];

/// Prepositional form on the site -> canonical form used for grouping
const DISTRICTS: [(&str, &str); 5] = [
    ("Кировском", "кировский"),
    ("Ленинском", "ленинский"),
    ("Октябрьском", "октябрьский"),
    ("Советском", "советский"),
    ("Томском", "томский"),
];

/// Month number (1..=12) for a genitive month name
pub fn month_number(name: &str) -> Result<u32, UnrecognizedMonthError> {
    MONTHS
        .iter()
        .find(|(month, _)| *month == name)
        .map(|(_, number)| *number)
        .ok_or_else(|| UnrecognizedMonthError(name.to_string()))
}

/// Canonical district name. Unknown districts are an error, never passed through.
pub fn normalize_district(raw: &str) -> Result<&'static str, UnrecognizedDistrictError> {
    DISTRICTS
        .iter()
        .find(|(form, _)| *form == raw)
        .map(|(_, normalized)| *normalized)
        .ok_or_else(|| UnrecognizedDistrictError(raw.to_string()))
}
