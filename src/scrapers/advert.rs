//! Extraction of a single advert from one row of the results table.
//!
//! Each field is read from its own node with its own pattern; fields do not
//! share state, so a failure in one never corrupts another. The order below is
//! the order in which fields are attempted.

use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use regex::{Captures, Regex};
use scraper::{ElementRef, Selector};

use super::error::{AdvertParseError, ExtractionFailure, Field, FieldExtractionError};
use super::rules;
use super::types::ExtractionMode;
use crate::models::Advert;

const LINK: &str = "a.visited_ads";
const DESCRIPTION: &str = "p:nth-of-type(2)";
const ADDRESS: &str = "p:nth-of-type(2) > a.map_link";
const PRICE: &str = r#"p[style="margin: 10px 0 0 2px;"] > b"#;
const PUBLICATION: &str = "p.absmiddle";

/// Marker the site prints instead of a date for adverts published today
const PUBLISHED_TODAY: &str = "Опубликовано сегодня";

static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| selector(LINK));
static DESCRIPTION_SEL: LazyLock<Selector> = LazyLock::new(|| selector(DESCRIPTION));
static ADDRESS_SEL: LazyLock<Selector> = LazyLock::new(|| selector(ADDRESS));
static PRICE_SEL: LazyLock<Selector> = LazyLock::new(|| selector(PRICE));
static PUBLICATION_SEL: LazyLock<Selector> = LazyLock::new(|| selector(PUBLICATION));

static EXTERNAL_ID_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"id=(\d+)"));
static CATEGORY_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"\((\w+)\)"));
static DISTRICT_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"в (\w+) районе"));
static FLOOR_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"на (\d+)-м этаже"));
static FLOOR_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"в (\d+)-этажном"));
static AREA_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"общей площадью (\d+(?:[.,]\d+)?)"));
static ROOM_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(\d+)-комнатную"));
static SINGLE_ROOM_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"\bкомнату\b"));
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(\d{1,2}) (\w+) (\d{4})"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("static pattern")
}

/// Parser for one advert row
#[derive(Debug, Clone)]
pub struct AdvertParser {
    mode: ExtractionMode,
    /// Fixed date for "published today"; the UTC clock is read per row when unset
    today: Option<NaiveDate>,
}

impl AdvertParser {
    /// Create a parser that resolves "published today" to the UTC date at parse time
    pub fn new(mode: ExtractionMode) -> Self {
        Self { mode, today: None }
    }

    /// Override the date used for "published today"
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Build an advert from one row. No partial advert is ever returned.
    pub fn parse(&self, row: ElementRef<'_>) -> Result<Advert, AdvertParseError> {
        let mut run = Extraction::new(self.mode);

        let external_id = run.field(Field::ExternalId, || external_id(row));
        let category = run.field(Field::Category, || category(row));
        let district = run.field(Field::District, || district(row));
        let address = run.field(Field::Address, || address(row));
        let floor_number = run.field(Field::FloorNumber, || floor_number(row));
        let floor_count = run.field(Field::FloorCount, || floor_count(row));
        let area = run.field(Field::Area, || area(row));
        let room_count = run.field(Field::RoomCount, || room_count(row));
        let price = run.field(Field::Price, || price(row));
        let publication_date =
            run.field(Field::PublicationDate, || publication_date(row, self.today()));

        let reported_id = external_id.clone();
        let (
            Some(external_id),
            Some(category),
            Some(district),
            Some(address),
            Some(floor_number),
            Some(floor_count),
            Some(area),
            Some(room_count),
            Some(price),
            Some(publication_date),
        ) = (
            external_id,
            category,
            district,
            address,
            floor_number,
            floor_count,
            area,
            room_count,
            price,
            publication_date,
        )
        else {
            return Err(AdvertParseError {
                external_id: reported_id,
                failures: run.failures,
            });
        };

        Ok(Advert {
            id: None,
            external_id,
            category,
            district,
            address,
            floor_number,
            floor_count,
            area,
            room_count,
            price,
            publication_date,
        })
    }
}

impl AdvertParser {
    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

impl Default for AdvertParser {
    fn default() -> Self {
        Self::new(ExtractionMode::default())
    }
}

/// Failure bookkeeping for one row
struct Extraction {
    mode: ExtractionMode,
    failures: Vec<FieldExtractionError>,
}

impl Extraction {
    fn new(mode: ExtractionMode) -> Self {
        Self {
            mode,
            failures: Vec::new(),
        }
    }

    /// Run one extractor. In fail-fast mode nothing runs after the first failure.
    fn field<T>(
        &mut self,
        field: Field,
        extract: impl FnOnce() -> Result<T, ExtractionFailure>,
    ) -> Option<T> {
        if self.mode == ExtractionMode::FailFast && !self.failures.is_empty() {
            return None;
        }
        match extract() {
            Ok(value) => Some(value),
            Err(reason) => {
                self.failures.push(FieldExtractionError::new(field, reason));
                None
            }
        }
    }
}

fn external_id(row: ElementRef<'_>) -> Result<String, ExtractionFailure> {
    let link = first(row, &LINK_SEL, LINK)?;
    let href = link
        .value()
        .attr("href")
        .ok_or(ExtractionFailure::MissingAttribute("href"))?;
    let found = capture(&EXTERNAL_ID_RE, href)?;
    Ok(found[1].to_string())
}

fn category(row: ElementRef<'_>) -> Result<String, ExtractionFailure> {
    let text = description_text(row)?;
    let found = capture(&CATEGORY_RE, &text)?;
    Ok(found[1].to_string())
}

fn district(row: ElementRef<'_>) -> Result<String, ExtractionFailure> {
    let text = description_text(row)?;
    let found = capture(&DISTRICT_RE, &text)?;
    let normalized = rules::normalize_district(&found[1])?;
    Ok(normalized.to_string())
}

fn address(row: ElementRef<'_>) -> Result<String, ExtractionFailure> {
    let link = first(row, &ADDRESS_SEL, ADDRESS)?;
    let text = flattened_text(link);
    if text.is_empty() {
        return Err(ExtractionFailure::EmptyText(ADDRESS));
    }
    Ok(text)
}

fn floor_number(row: ElementRef<'_>) -> Result<u32, ExtractionFailure> {
    let text = description_text(row)?;
    let found = capture(&FLOOR_NUMBER_RE, &text)?;
    integer(&found[1])
}

fn floor_count(row: ElementRef<'_>) -> Result<u32, ExtractionFailure> {
    let text = description_text(row)?;
    let found = capture(&FLOOR_COUNT_RE, &text)?;
    integer(&found[1])
}

/// The area follows the address link, so it is read from the whole paragraph
fn area(row: ElementRef<'_>) -> Result<f64, ExtractionFailure> {
    let paragraph = first(row, &DESCRIPTION_SEL, DESCRIPTION)?;
    let text = flattened_text(paragraph);
    let found = capture(&AREA_RE, &text)?;
    decimal(&found[1])
}

fn room_count(row: ElementRef<'_>) -> Result<Option<u32>, ExtractionFailure> {
    let link = first(row, &LINK_SEL, LINK)?;
    let text = flattened_text(link);
    if let Some(found) = ROOM_COUNT_RE.captures(&text) {
        return integer(&found[1]).map(Some);
    }
    if SINGLE_ROOM_RE.is_match(&text) {
        return Ok(None);
    }
    Err(ExtractionFailure::PatternMismatch {
        pattern: ROOM_COUNT_RE.as_str(),
        text,
    })
}

/// Prices are printed in thousands of roubles
fn price(row: ElementRef<'_>) -> Result<f64, ExtractionFailure> {
    let node = first(row, &PRICE_SEL, PRICE)?;
    let thousands = decimal(&flattened_text(node))?;
    Ok(thousands * 1000.0)
}

fn publication_date(row: ElementRef<'_>, today: NaiveDate) -> Result<NaiveDate, ExtractionFailure> {
    let node = first(row, &PUBLICATION_SEL, PUBLICATION)?;
    let text = flattened_text(node);
    if text.contains(PUBLISHED_TODAY) {
        return Ok(today);
    }
    let found = capture(&DATE_RE, &text)?;
    let day = integer(&found[1])?;
    let month = rules::month_number(&found[2])?;
    let year = found[3]
        .parse::<i32>()
        .map_err(|_| ExtractionFailure::InvalidNumber(found[3].to_string()))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(ExtractionFailure::InvalidDate { day, month, year })
}

fn first<'a>(
    root: ElementRef<'a>,
    selector: &Selector,
    css: &'static str,
) -> Result<ElementRef<'a>, ExtractionFailure> {
    root.select(selector)
        .next()
        .ok_or(ExtractionFailure::MissingNode(css))
}

/// Text before the first child element of the descriptive paragraph
fn description_text(row: ElementRef<'_>) -> Result<String, ExtractionFailure> {
    let paragraph = first(row, &DESCRIPTION_SEL, DESCRIPTION)?;
    Ok(leading_text(paragraph))
}

fn leading_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .map_while(|child| child.value().as_text().map(|text| &**text))
        .collect()
}

fn flattened_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn capture<'t>(re: &'static Regex, text: &'t str) -> Result<Captures<'t>, ExtractionFailure> {
    re.captures(text)
        .ok_or_else(|| ExtractionFailure::PatternMismatch {
            pattern: re.as_str(),
            text: text.trim().to_string(),
        })
}

/// Floors, room counts and days are counted from one
fn integer(digits: &str) -> Result<u32, ExtractionFailure> {
    match digits.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ExtractionFailure::InvalidNumber(digits.to_string())),
    }
}

/// Accepts "43.5", "43,5" and thousands separated by (non-breaking) spaces.
/// Only finite positive amounts are valid areas and prices.
fn decimal(text: &str) -> Result<f64, ExtractionFailure> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    match compact.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(ExtractionFailure::InvalidNumber(text.to_string())),
    }
}
