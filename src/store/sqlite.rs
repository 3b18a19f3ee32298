use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::FromSql;
use rusqlite::{named_params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use tracing::info;

use super::{AdvertStore, Result, StoreError};
use crate::models::{Advert, AdvertFilter, FilterOptions};

/// Floors above this are too sparse to be worth a filter entry
const MAX_FILTER_FLOOR: u32 = 10;
/// Same for room counts
const MAX_FILTER_ROOMS: u32 = 5;

const SELECT_ADVERT: &str = "SELECT id, external_id, category, district, address, \
     floor_number, floor_count, area, room_count, price, publication_date FROM adverts";

/// SQLite-backed advert store over a single shared connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and create if needed) the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening advert store at {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    /// Private store that lives as long as the value
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of stored adverts
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM adverts", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS adverts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL,
            category TEXT NOT NULL,
            district TEXT NOT NULL,
            address TEXT NOT NULL,
            floor_number INTEGER NOT NULL,
            floor_count INTEGER NOT NULL,
            area REAL NOT NULL,
            room_count INTEGER,
            price REAL NOT NULL,
            publication_date TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_adverts_external_id
            ON adverts(external_id);
        CREATE INDEX IF NOT EXISTS idx_adverts_publication_date
            ON adverts(publication_date);
        "#,
    )?;
    Ok(())
}

fn row_to_advert(row: &Row<'_>) -> rusqlite::Result<Advert> {
    Ok(Advert {
        id: row.get("id")?,
        external_id: row.get("external_id")?,
        category: row.get("category")?,
        district: row.get("district")?,
        address: row.get("address")?,
        floor_number: row.get("floor_number")?,
        floor_count: row.get("floor_count")?,
        area: row.get("area")?,
        room_count: row.get("room_count")?,
        price: row.get("price")?,
        publication_date: row.get("publication_date")?,
    })
}

fn distinct<T: FromSql>(conn: &Connection, column: &str, condition: &str) -> Result<Vec<T>> {
    let sql = format!(
        "SELECT DISTINCT {column} FROM adverts WHERE {column} IS NOT NULL {condition} ORDER BY {column}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let values = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(values)
}

#[async_trait]
impl AdvertStore for SqliteStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Advert>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{SELECT_ADVERT} WHERE external_id = ?"))?;
        let advert = stmt
            .query_row([external_id], row_to_advert)
            .optional()?;
        Ok(advert)
    }

    async fn save(&self, advert: &mut Advert) -> Result<()> {
        let conn = self.lock()?;
        let fields = named_params! {
            ":id": advert.id,
            ":external_id": advert.external_id,
            ":category": advert.category,
            ":district": advert.district,
            ":address": advert.address,
            ":floor_number": advert.floor_number,
            ":floor_count": advert.floor_count,
            ":area": advert.area,
            ":room_count": advert.room_count,
            ":price": advert.price,
            ":publication_date": advert.publication_date,
        };

        match advert.id {
            Some(_) => {
                conn.execute(
                    r#"
                    INSERT INTO adverts (id, external_id, category, district, address,
                        floor_number, floor_count, area, room_count, price, publication_date)
                    VALUES (:id, :external_id, :category, :district, :address,
                        :floor_number, :floor_count, :area, :room_count, :price, :publication_date)
                    ON CONFLICT(id) DO UPDATE SET
                        external_id = excluded.external_id,
                        category = excluded.category,
                        district = excluded.district,
                        address = excluded.address,
                        floor_number = excluded.floor_number,
                        floor_count = excluded.floor_count,
                        area = excluded.area,
                        room_count = excluded.room_count,
                        price = excluded.price,
                        publication_date = excluded.publication_date
                    "#,
                    fields,
                )?;
            }
            None => {
                conn.execute(
                    r#"
                    INSERT INTO adverts (id, external_id, category, district, address,
                        floor_number, floor_count, area, room_count, price, publication_date)
                    VALUES (:id, :external_id, :category, :district, :address,
                        :floor_number, :floor_count, :area, :room_count, :price, :publication_date)
                    "#,
                    fields,
                )?;
                advert.id = Some(conn.last_insert_rowid());
            }
        }

        Ok(())
    }

    async fn find(&self, filter: &AdvertFilter) -> Result<Vec<Advert>> {
        let mut sql = format!("{SELECT_ADVERT} WHERE 1 = 1");
        let mut values: Vec<Box<dyn ToSql + Send>> = Vec::new();

        if let Some(category) = &filter.category {
            sql.push_str(" AND category = ?");
            values.push(Box::new(category.clone()));
        }
        if let Some(district) = &filter.district {
            sql.push_str(" AND district = ?");
            values.push(Box::new(district.clone()));
        }
        if let Some(floor_number) = filter.floor_number {
            sql.push_str(" AND floor_number = ?");
            values.push(Box::new(floor_number));
        }
        if let Some(room_count) = filter.room_count {
            sql.push_str(" AND room_count = ?");
            values.push(Box::new(room_count));
        }
        if let Some(since) = filter.published_since {
            sql.push_str(" AND publication_date >= ?");
            values.push(Box::new(since));
        }
        sql.push_str(" ORDER BY publication_date, id");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let adverts = stmt
            .query_map(params_from_iter(values.iter()), row_to_advert)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(adverts)
    }

    async fn filter_options(&self) -> Result<FilterOptions> {
        let conn = self.lock()?;
        Ok(FilterOptions {
            categories: distinct(&conn, "category", "")?,
            districts: distinct(&conn, "district", "")?,
            floor_numbers: distinct(
                &conn,
                "floor_number",
                &format!("AND floor_number <= {MAX_FILTER_FLOOR}"),
            )?,
            room_counts: distinct(
                &conn,
                "room_count",
                &format!("AND room_count <= {MAX_FILTER_ROOMS}"),
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn advert(external_id: &str) -> Advert {
        Advert {
            id: None,
            external_id: external_id.to_string(),
            category: "вторичное".to_string(),
            district: "советский".to_string(),
            address: "ул. Красноармейская, 99".to_string(),
            floor_number: 3,
            floor_count: 9,
            area: 54.2,
            room_count: Some(2),
            price: 2_400_000.0,
            publication_date: date(2012, 6, 1),
        }
    }

    #[tokio::test]
    async fn round_trip_preserves_every_field() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut original = advert("100");
        original.room_count = None;

        store.save(&mut original).await.unwrap();
        assert!(original.id.is_some());

        let loaded = store.find_by_external_id("100").await.unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn unknown_external_id_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.find_by_external_id("404").await.unwrap(), None);
    }

    #[tokio::test]
    async fn saving_with_an_id_updates_in_place() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut first = advert("100");
        store.save(&mut first).await.unwrap();

        let mut second = advert("100");
        second.id = first.id;
        second.price = 2_300_000.0;
        store.save(&mut second).await.unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let loaded = store.find_by_external_id("100").await.unwrap().unwrap();
        assert_eq!(loaded.id, first.id);
        assert_eq!(loaded.price, 2_300_000.0);
    }

    #[tokio::test]
    async fn external_id_is_unique() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save(&mut advert("100")).await.unwrap();

        let err = store.save(&mut advert("100")).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn find_applies_every_filter() {
        let store = SqliteStore::open_in_memory().unwrap();

        let mut old = advert("1");
        old.publication_date = date(2011, 1, 1);
        let mut other_district = advert("2");
        other_district.district = "ленинский".to_string();
        let mut single_room = advert("3");
        single_room.room_count = None;
        let mut matching = advert("4");
        matching.publication_date = date(2012, 6, 2);
        let mut also_matching = advert("5");
        also_matching.publication_date = date(2012, 5, 30);

        for a in [
            &mut old,
            &mut other_district,
            &mut single_room,
            &mut matching,
            &mut also_matching,
        ] {
            store.save(a).await.unwrap();
        }

        let filter = AdvertFilter {
            category: Some("вторичное".to_string()),
            district: Some("советский".to_string()),
            floor_number: Some(3),
            room_count: Some(2),
            published_since: Some(date(2012, 1, 1)),
        };
        let ids: Vec<_> = store
            .find(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.external_id)
            .collect();
        assert_eq!(ids, vec!["5", "4"]);

        let everything = store.find(&AdvertFilter::default()).await.unwrap();
        assert_eq!(everything.len(), 5);
    }

    #[tokio::test]
    async fn filter_options_are_sorted_and_capped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let variants = [
            ("1", "первичное", "томский", 12, Some(6)),
            ("2", "вторичное", "кировский", 4, Some(1)),
            ("3", "вторичное", "советский", 1, None),
            ("4", "вторичное", "кировский", 10, Some(5)),
        ];
        for (id, category, district, floor, rooms) in variants {
            let mut a = advert(id);
            a.category = category.to_string();
            a.district = district.to_string();
            a.floor_number = floor;
            a.floor_count = 16;
            a.room_count = rooms;
            store.save(&mut a).await.unwrap();
        }

        let options = store.filter_options().await.unwrap();
        assert_eq!(options.categories, vec!["вторичное", "первичное"]);
        assert_eq!(options.districts, vec!["кировский", "советский", "томский"]);
        assert_eq!(options.floor_numbers, vec![1, 4, 10]);
        assert_eq!(options.room_counts, vec![1, 5]);
    }

    #[tokio::test]
    async fn file_store_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("realty.db");

        let mut saved = advert("77");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save(&mut saved).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.find_by_external_id("77").await.unwrap(), Some(saved));
    }
}
