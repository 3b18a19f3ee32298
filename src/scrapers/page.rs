use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::advert::AdvertParser;
use super::error::AdvertParseError;
use crate::models::Advert;

static ADVERT_ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.realty tr[class]").expect("static selector"));
static NEXT_PAGE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.pager_next > a").expect("static selector"));

/// Everything the crawler needs from one results page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub adverts: Vec<Advert>,
    /// Rows that could not be parsed and were dropped
    pub skipped: Vec<AdvertParseError>,
    /// Pager link as printed on the page, usually site-relative
    pub next_page: Option<String>,
}

/// Parser for a page of the results table
#[derive(Debug, Clone, Default)]
pub struct AdvertListParser {
    parser: AdvertParser,
}

impl AdvertListParser {
    pub fn new(parser: AdvertParser) -> Self {
        Self { parser }
    }

    /// Listing rows of the results table, in page order
    pub fn rows<'a>(&'a self, root: &'a Html) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        root.select(&ADVERT_ROW_SEL)
    }

    /// Parse outcome for every row, in page order
    pub fn parse_rows<'a>(
        &'a self,
        root: &'a Html,
    ) -> impl Iterator<Item = Result<Advert, AdvertParseError>> + 'a {
        self.rows(root).map(|row| self.parser.parse(row))
    }

    /// Successfully parsed adverts; rows that fail are logged and skipped
    pub fn parse_adverts<'a>(&'a self, root: &'a Html) -> impl Iterator<Item = Advert> + 'a {
        self.parse_rows(root).filter_map(|result| match result {
            Ok(advert) => Some(advert),
            Err(err) => {
                warn!("can not parse advert: {}", err);
                None
            }
        })
    }

    /// Address of the next results page, if the pager has one
    pub fn parse_next_page_address(&self, root: &Html) -> Option<String> {
        let link = root.select(&NEXT_PAGE_SEL).next()?;
        match link.value().attr("href") {
            Some(href) if !href.trim().is_empty() => Some(href.trim().to_string()),
            _ => {
                warn!("pager link has no address, treating page as the last one");
                None
            }
        }
    }

    /// Parse a whole page in one pass
    pub fn parse_page(&self, html: &str) -> ParsedPage {
        let root = Html::parse_document(html);
        let mut page = ParsedPage {
            next_page: self.parse_next_page_address(&root),
            ..ParsedPage::default()
        };

        for result in self.parse_rows(&root) {
            match result {
                Ok(advert) => {
                    debug!("advert {} parsed", advert.external_id);
                    page.adverts.push(advert);
                }
                Err(err) => {
                    warn!("can not parse advert: {}", err);
                    page.skipped.push(err);
                }
            }
        }

        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::error::Field;
    use chrono::NaiveDate;

    fn advert_row(id: u32, district: &str) -> String {
        format!(
            r##"<tr class="realty_ad_text_1"><td>
            <p><a class="visited_ads" href="/realty/?id={id}">1-комнатную</a></p>
            <p>Продаётся (первичное) в {district} районе на 2-м этаже в 5-этажном доме
            <a class="map_link" href="#">пр. Фрунзе, {id}</a>, общей площадью 31</p>
            <p>Телефон</p>
            <p style="margin: 10px 0 0 2px;"><b>1500</b> тыс. руб.</p>
            <p class="absmiddle">Опубликовано 3 мая 2012</p>
            </td></tr>"##
        )
    }

    fn page(rows: &[String], pager: &str) -> String {
        format!(
            r#"<html><body>
            <table class="realty"><tr><th>Объявления</th></tr>{}</table>
            <div class="pager">{pager}</div>
            </body></html>"#,
            rows.concat()
        )
    }

    fn parser() -> AdvertListParser {
        let today = NaiveDate::from_ymd_opt(2012, 5, 10).unwrap();
        AdvertListParser::new(AdvertParser::default().with_today(today))
    }

    #[test]
    fn bad_rows_are_skipped_not_fatal() {
        let html = page(
            &[
                advert_row(1, "Советском"),
                advert_row(2, "Северном"),
                advert_row(3, "Ленинском"),
            ],
            "",
        );

        let parsed = parser().parse_page(&html);

        let ids: Vec<_> = parsed.adverts.iter().map(|a| a.external_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].external_id.as_deref(), Some("2"));
        assert_eq!(parsed.skipped[0].failures[0].field, Field::District);
    }

    #[test]
    fn header_rows_without_class_are_ignored() {
        let html = page(&[advert_row(10, "Томском")], "");
        let root = Html::parse_document(&html);
        assert_eq!(parser().rows(&root).count(), 1);
    }

    #[test]
    fn lazy_sequence_yields_only_good_adverts() {
        let html = page(&[advert_row(1, "Северном"), advert_row(2, "Кировском")], "");
        let root = Html::parse_document(&html);
        let list = parser();

        let mut adverts = list.parse_adverts(&root);
        assert_eq!(adverts.next().map(|a| a.external_id), Some("2".to_string()));
        assert!(adverts.next().is_none());
    }

    #[test]
    fn next_page_comes_from_the_pager() {
        let html = page(
            &[advert_row(1, "Кировском")],
            r#"<span class="pager_next"><a href="/realty/?page=2&amp;perpage=50">далее</a></span>"#,
        );
        let parsed = parser().parse_page(&html);
        assert_eq!(parsed.next_page.as_deref(), Some("/realty/?page=2&perpage=50"));
    }

    #[test]
    fn last_page_has_no_next_link() {
        let html = page(&[advert_row(1, "Кировском")], r#"<span class="pager_prev"><a href="/x">назад</a></span>"#);
        assert_eq!(parser().parse_page(&html).next_page, None);
    }

    #[test]
    fn empty_pager_href_ends_pagination() {
        let html = page(&[], r#"<span class="pager_next"><a href=" ">далее</a></span>"#);
        let parsed = parser().parse_page(&html);
        assert!(parsed.adverts.is_empty());
        assert_eq!(parsed.next_page, None);
    }
}
