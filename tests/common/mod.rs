//! Fixtures shared by the crawl tests: synthetic results pages and a fetcher
//! that serves them from memory.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use realty_scout::scrapers::error::FetchError;
use realty_scout::scrapers::{AdvertListParser, AdvertParser, PageFetcher};

pub const BASE_URL: &str = "http://realty.test";

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2012, 6, 15).unwrap()
}

pub fn parser() -> AdvertListParser {
    AdvertListParser::new(AdvertParser::default().with_today(today()))
}

/// A well-formed advert row
pub fn advert_row(id: u32) -> String {
    priced_row(id, 1800)
}

pub fn priced_row(id: u32, thousands: u32) -> String {
    format!(
        r##"<tr class="realty_ad_text_1"><td>
        <p><a class="visited_ads" href="/realty/?id={id}">3-комнатную</a></p>
        <p>Продаётся квартира (вторичное) в Октябрьском районе на 4-м этаже в 10-этажном доме
        <a class="map_link" href="#">ул. Иркутский тракт, {id}</a>, общей площадью 64.8 кв.м.</p>
        <p>Телефон: 12-34-56</p>
        <p style="margin: 10px 0 0 2px;"><b>{thousands}</b> тыс. руб.</p>
        <p class="absmiddle">Опубликовано сегодня</p>
        </td></tr>"##
    )
}

/// A row the parser must reject
pub fn broken_row(id: u32) -> String {
    format!(
        r#"<tr class="realty_ad_text_1"><td>
        <p><a class="visited_ads" href="/realty/?id={id}">3-комнатную</a></p>
        <p>Описание отсутствует</p>
        </td></tr>"#
    )
}

pub fn page_path(number: u32) -> String {
    format!("/realty/?page={number}")
}

pub fn page_url(number: u32) -> String {
    format!("{BASE_URL}{}", page_path(number))
}

/// Results page; `next` is the number of the page the pager links to
pub fn results_page(rows: &[String], next: Option<u32>) -> String {
    let pager = match next {
        Some(number) => format!(
            r#"<span class="pager_next"><a href="{}">следующая</a></span>"#,
            page_path(number)
        ),
        None => String::new(),
    };
    format!(
        r#"<html><body>
        <table class="realty"><tr><th>Цена</th></tr>{}</table>
        <div class="pager">{pager}</div>
        </body></html>"#,
        rows.concat()
    )
}

pub enum Response {
    Page(String),
    Status(u16),
}

/// Serves scripted responses per URL and records every request
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, VecDeque<Response>>>,
    requested: Mutex<Vec<String>>,
    cancel_on: Mutex<Option<(String, CancellationToken)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `url`; the last queued response repeats
    pub fn respond(&self, url: &str, response: Response) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn page(&self, url: &str, html: String) -> &Self {
        self.respond(url, Response::Page(html))
    }

    /// Fire `token` when `url` is served
    pub fn cancel_after(&self, url: &str, token: CancellationToken) {
        *self.cancel_on.lock().unwrap() = Some((url.to_string(), token));
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());

        if let Some((cancel_url, token)) = self.cancel_on.lock().unwrap().as_ref() {
            if cancel_url == url {
                token.cancel();
            }
        }

        let mut responses = self.responses.lock().unwrap();
        let queue = responses.get_mut(url).expect("unscripted URL requested");
        let response = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            match queue.front().unwrap() {
                Response::Page(html) => Response::Page(html.clone()),
                Response::Status(status) => Response::Status(*status),
            }
        };

        match response {
            Response::Page(html) => Ok(html),
            Response::Status(status) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}
