use std::fmt;

use thiserror::Error;

/// Advert fields in extraction order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ExternalId,
    Category,
    District,
    Address,
    FloorNumber,
    FloorCount,
    Area,
    RoomCount,
    Price,
    PublicationDate,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::ExternalId => "externalId",
            Field::Category => "category",
            Field::District => "district",
            Field::Address => "address",
            Field::FloorNumber => "floorNumber",
            Field::FloorCount => "floorCount",
            Field::Area => "area",
            Field::RoomCount => "roomCount",
            Field::Price => "price",
            Field::PublicationDate => "publicationDate",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw month name outside the closed month table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("can not define number for month \"{0}\"")]
pub struct UnrecognizedMonthError(pub String);

/// Raw district name outside the closed district table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("can not normalize district \"{0}\"")]
pub struct UnrecognizedDistrictError(pub String);

/// Why a single field could not be extracted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionFailure {
    #[error("no node matches `{0}`")]
    MissingNode(&'static str),
    #[error("node `{0}` has no text")]
    EmptyText(&'static str),
    #[error("attribute `{0}` is missing")]
    MissingAttribute(&'static str),
    #[error("text {text:?} does not match /{pattern}/")]
    PatternMismatch { pattern: &'static str, text: String },
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
    #[error(transparent)]
    UnrecognizedDistrict(#[from] UnrecognizedDistrictError),
    #[error(transparent)]
    UnrecognizedMonth(#[from] UnrecognizedMonthError),
    #[error("{day}.{month}.{year} is not a calendar date")]
    InvalidDate { day: u32, month: u32, year: i32 },
}

/// A required node is missing or a pattern failed to match
#[derive(Debug, Clone, PartialEq, Error)]
#[error("can not extract {field}: {reason}")]
pub struct FieldExtractionError {
    pub field: Field,
    pub reason: ExtractionFailure,
}

impl FieldExtractionError {
    pub fn new(field: Field, reason: impl Into<ExtractionFailure>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// One listing could not be turned into an advert.
///
/// Always holds at least one field failure; in fail-fast mode exactly one.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertParseError {
    pub external_id: Option<String>,
    pub failures: Vec<FieldExtractionError>,
}

impl AdvertParseError {
    /// Failed fields in extraction order
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.failures.iter().map(|f| f.field)
    }
}

impl fmt::Display for AdvertParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.external_id {
            Some(id) => write!(f, "advert {id}: ")?,
            None => f.write_str("advert: ")?,
        }
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AdvertParseError {}

/// Page retrieval failed
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("can not read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Transport failures, throttling and server errors are worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Request { .. } | FetchError::Body { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}
