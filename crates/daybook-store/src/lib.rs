//! Storage layer for daybook.
//!
//! Persists flattened diary entries using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization. Concurrent writers from
//! several processes are not coordinated beyond what `SQLite` itself provides.
//!
//! # Schema
//!
//! Entries live in a single `entries` table whose column order matches
//! existing `diary.db` files:
//!
//! ```text
//! message, feeling, rating, location, date, time,
//! day_screentime, day_communication, day_audio, day_productive, day_other,
//! temp, cloud_cover, location_name
//! ```
//!
//! `date` is stored as `YYYY-MM-DD` and `time` as `YYYY-MM-DD HH:MM:SS.ffffff`
//! (local time), so text comparison on either column follows chronological
//! order. Rows are read back in `rowid` order, which is insertion order.
//!
//! Older files may hold a free-text `rating` and fractional `day_*` seconds.
//! Both are accepted on read; durations are rounded to whole seconds.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use daybook_core::entry::{DATE_FORMAT, TIME_FORMAT};
use daybook_core::{
    CategoryTotals, DiaryEntry, EntryField, FieldPredicate, QueryError, QueryValue, Rating,
};
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The requested predicate does not fit the entry schema.
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),
    /// A stored row could not be decoded.
    #[error("invalid stored {column} at row {rowid}: {value}")]
    InvalidRow {
        rowid: i64,
        column: &'static str,
        value: String,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

const SELECT_ENTRIES: &str = "
    SELECT rowid, message, feeling, rating, location, date, time,
           day_screentime, day_communication, day_audio, day_productive, day_other,
           temp, cloud_cover, location_name
    FROM entries
";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entries (
                message TEXT,
                feeling TEXT,
                rating INTEGER,
                location TEXT,
                date TEXT,
                time TEXT,
                day_screentime INTEGER,
                day_communication INTEGER,
                day_audio INTEGER,
                day_productive INTEGER,
                day_other INTEGER,
                temp INTEGER,
                cloud_cover INTEGER,
                location_name TEXT
            );
            ",
        )?;
        Ok(())
    }

    /// Appends one entry. Entries are never updated in place.
    pub fn insert_entry(&mut self, entry: &DiaryEntry) -> Result<(), StoreError> {
        self.conn.execute(
            "
            INSERT INTO entries
            (message, feeling, rating, location, date, time,
             day_screentime, day_communication, day_audio, day_productive, day_other,
             temp, cloud_cover, location_name)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                entry.message,
                entry.feeling,
                rating_value(&entry.rating),
                entry.location,
                entry.created_date.format(DATE_FORMAT).to_string(),
                entry.created_time.format(TIME_FORMAT).to_string(),
                entry.totals.screen_time_total,
                entry.totals.communication,
                entry.totals.audio,
                entry.totals.productive,
                entry.totals.other,
                entry.temperature,
                entry.cloud_cover,
                entry.location_name,
            ],
        )?;
        tracing::debug!(date = %entry.created_date, "inserted entry");
        Ok(())
    }

    /// Lists all entries in insertion order.
    pub fn query_all(&self) -> Result<Vec<DiaryEntry>, StoreError> {
        self.select(&format!("{SELECT_ENTRIES} ORDER BY rowid ASC"), [])
    }

    /// Lists entries whose message contains `needle` (case-sensitive).
    pub fn query_containing(&self, needle: &str) -> Result<Vec<DiaryEntry>, StoreError> {
        self.select(
            &format!("{SELECT_ENTRIES} WHERE instr(message, ?) > 0 ORDER BY rowid ASC"),
            [needle],
        )
    }

    /// Lists entries matching a validated predicate.
    ///
    /// The column name comes from [`EntryField::column`], never from user text.
    pub fn query_by_field(&self, predicate: &FieldPredicate) -> Result<Vec<DiaryEntry>, StoreError> {
        let column = predicate.field.column();
        let op = predicate.op.as_sql();
        let value = match &predicate.value {
            QueryValue::Text(text) => Value::Text(text.clone()),
            QueryValue::Integer(int) => Value::Integer(*int),
            QueryValue::Real(real) => Value::Real(*real),
        };
        self.select(
            &format!("{SELECT_ENTRIES} WHERE {column} {op} ? ORDER BY rowid ASC"),
            [value],
        )
    }

    /// Parses raw `field`, `op` and `value` input, then queries.
    ///
    /// Input that fails validation is rejected before the database is touched.
    pub fn query_by_field_str(
        &self,
        field: &str,
        op: &str,
        value: &str,
    ) -> Result<Vec<DiaryEntry>, StoreError> {
        let predicate = FieldPredicate::parse(field, op, value)?;
        self.query_by_field(&predicate)
    }

    /// Counts stored entries.
    pub fn count_entries(&self) -> Result<i64, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count)
    }

    fn select<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<DiaryEntry>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, read_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }
}

fn rating_value(rating: &Rating) -> Value {
    match rating {
        Rating::Score(score) => Value::Integer(*score),
        Rating::Text(text) => Value::Text(text.clone()),
    }
}

/// A row as stored, before the loosely typed columns are decoded.
#[derive(Debug)]
struct EntryRow {
    rowid: i64,
    message: String,
    feeling: String,
    rating: Value,
    location: String,
    date: String,
    time: String,
    /// `day_screentime` through `day_other`, in column order.
    durations: [Value; 5],
    temperature: f64,
    cloud_cover: f64,
    location_name: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        rowid: row.get(0)?,
        message: row.get(1)?,
        feeling: row.get(2)?,
        rating: row.get(3)?,
        location: row.get(4)?,
        date: row.get(5)?,
        time: row.get(6)?,
        durations: [
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
            row.get(10)?,
            row.get(11)?,
        ],
        temperature: row.get(12)?,
        cloud_cover: row.get(13)?,
        location_name: row.get(14)?,
    })
}

impl EntryRow {
    fn invalid(&self, field: EntryField, value: &Value) -> StoreError {
        StoreError::InvalidRow {
            rowid: self.rowid,
            column: field.column(),
            value: format!("{value:?}"),
        }
    }

    fn decode_rating(&self) -> Result<Rating, StoreError> {
        match &self.rating {
            Value::Integer(score) => Ok(Rating::Score(*score)),
            Value::Text(text) => Ok(Rating::from(text.as_str())),
            Value::Real(real) => Ok(Rating::Text(real.to_string())),
            other => Err(self.invalid(EntryField::Rating, other)),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn decode_duration(&self, field: EntryField, value: &Value) -> Result<i64, StoreError> {
        match value {
            Value::Integer(seconds) => Ok(*seconds),
            Value::Real(seconds) if seconds.is_finite() => Ok(seconds.round() as i64),
            Value::Null => Ok(0),
            other => Err(self.invalid(field, other)),
        }
    }

    fn decode_totals(&self) -> Result<CategoryTotals, StoreError> {
        let [screen_time, communication, audio, productive, other] = &self.durations;
        Ok(CategoryTotals {
            screen_time_total: self.decode_duration(EntryField::DayScreentime, screen_time)?,
            communication: self.decode_duration(EntryField::DayCommunication, communication)?,
            audio: self.decode_duration(EntryField::DayAudio, audio)?,
            productive: self.decode_duration(EntryField::DayProductive, productive)?,
            other: self.decode_duration(EntryField::DayOther, other)?,
        })
    }

    fn into_entry(self) -> Result<DiaryEntry, StoreError> {
        let rating = self.decode_rating()?;
        let totals = self.decode_totals()?;
        let created_date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT).map_err(|_| {
            StoreError::InvalidRow {
                rowid: self.rowid,
                column: EntryField::Date.column(),
                value: self.date.clone(),
            }
        })?;
        let created_time = NaiveDateTime::parse_from_str(&self.time, TIME_FORMAT).map_err(|_| {
            StoreError::InvalidRow {
                rowid: self.rowid,
                column: EntryField::Time.column(),
                value: self.time.clone(),
            }
        })?;
        Ok(DiaryEntry {
            message: self.message,
            feeling: self.feeling,
            rating,
            location: self.location,
            location_name: self.location_name,
            created_date,
            created_time,
            totals,
            temperature: self.temperature,
            cloud_cover: self.cloud_cover,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str, rating: i64, audio: i64) -> DiaryEntry {
        let created_time = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_micro_opt(21, 15, 2, 123_456)
            .unwrap();
        DiaryEntry {
            message: message.to_string(),
            feeling: "fine".to_string(),
            rating: Rating::Score(rating),
            location: "[38.7223, -9.1393]".to_string(),
            location_name: "Lisbon".to_string(),
            created_date: created_time.date(),
            created_time,
            totals: CategoryTotals {
                screen_time_total: audio + 420,
                communication: 300,
                audio,
                productive: 0,
                other: 120,
            },
            temperature: 14.5,
            cloud_cover: 80.0,
        }
    }

    fn messages(entries: &[DiaryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory().expect("open in-memory db");
        assert_eq!(db.count_entries().unwrap(), 0);
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().unwrap();
        let mut stmt = db.conn.prepare("PRAGMA table_info(entries)").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .map(|row| row.expect("table_info row"))
            .collect();
        let expected: Vec<&str> = EntryField::ALL.iter().map(|f| f.column()).collect();
        assert_eq!(columns, expected);
    }

    #[test]
    fn schema_init_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("diary.db");
        {
            let mut db = Database::open(&path).unwrap();
            db.insert_entry(&entry("first", 5, 600)).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.count_entries().unwrap(), 1);
    }

    #[test]
    fn insert_then_query_all_roundtrips_every_field() {
        let mut db = Database::open_in_memory().unwrap();
        let original = entry("it rained today", 7, 600);
        db.insert_entry(&original).unwrap();

        let stored = db.query_all().unwrap();
        assert_eq!(stored, vec![original]);
    }

    #[test]
    fn whole_number_readings_survive_integer_affinity() {
        let mut db = Database::open_in_memory().unwrap();
        let mut original = entry("cold", 3, 0);
        original.temperature = -2.0;
        original.cloud_cover = 100.0;
        db.insert_entry(&original).unwrap();

        let stored = db.query_all().unwrap();
        assert_eq!(stored[0].temperature, -2.0);
        assert_eq!(stored[0].cloud_cover, 100.0);
    }

    #[test]
    fn query_all_preserves_insertion_order() {
        let mut db = Database::open_in_memory().unwrap();
        for message in ["c", "a", "b"] {
            db.insert_entry(&entry(message, 5, 0)).unwrap();
        }
        assert_eq!(messages(&db.query_all().unwrap()), vec!["c", "a", "b"]);
    }

    #[test]
    fn query_containing_matches_substring_case_sensitively() {
        let mut db = Database::open_in_memory().unwrap();
        db.insert_entry(&entry("it rained today", 5, 0)).unwrap();
        db.insert_entry(&entry("sunny", 5, 0)).unwrap();
        db.insert_entry(&entry("Rain again", 5, 0)).unwrap();

        let found = db.query_containing("rain").unwrap();
        assert_eq!(messages(&found), vec!["it rained today"]);
    }

    #[test]
    fn query_by_field_compares_typed_values() {
        let mut db = Database::open_in_memory().unwrap();
        db.insert_entry(&entry("low", 2, 60)).unwrap();
        db.insert_entry(&entry("mid", 6, 3600)).unwrap();
        db.insert_entry(&entry("high", 9, 7200)).unwrap();

        let found = db.query_by_field_str("rating", ">=", "6").unwrap();
        assert_eq!(messages(&found), vec!["mid", "high"]);

        let found = db.query_by_field_str("day_audio", "<", "1:00:00").unwrap();
        assert_eq!(messages(&found), vec!["low"]);

        let found = db.query_by_field_str("Message", "<>", "mid").unwrap();
        assert_eq!(messages(&found), vec!["low", "high"]);

        let found = db.query_by_field_str("temperature", "=", "14.5").unwrap();
        assert_eq!(found.len(), 3);

        let found = db.query_by_field_str("date", "=", "2025-03-01").unwrap();
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn invalid_field_is_rejected_without_touching_the_store() {
        let mut db = Database::open_in_memory().unwrap();
        db.insert_entry(&entry("kept", 5, 0)).unwrap();

        let err = db
            .query_by_field_str("1=1; DROP TABLE entries; --", "=", "x")
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidQuery(QueryError::UnknownField(_))
        ));

        let err = db.query_by_field_str("rating", "LIKE", "5").unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidQuery(QueryError::UnknownOperator(_))
        ));
        assert_eq!(db.count_entries().unwrap(), 1);
    }

    #[test]
    fn undecodable_row_is_reported() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO entries VALUES ('m', 'f', 1, '[0, 0]', 'yesterday', '2025-03-01 10:00:00.000000', 0, 0, 0, 0, 0, 1, 1, 'x')",
                [],
            )
            .unwrap();
        let err = db.query_all().unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow { column: "date", .. }));
    }

    #[test]
    fn older_rows_with_text_ratings_and_fractional_durations_are_readable() {
        let mut db = Database::open_in_memory().unwrap();
        db.insert_entry(&entry("new", 6, 60)).unwrap();
        db.conn
            .execute(
                "INSERT INTO entries VALUES ('old', 'fine', 'good', '[0, 0]', '2024-11-02', '2024-11-02 22:10:05.500000', 600.6, 120.4, 0, 480.2, 0, 9, 40, 'Porto')",
                [],
            )
            .unwrap();

        let entries = db.query_all().unwrap();
        assert_eq!(messages(&entries), vec!["new", "old"]);
        let old = &entries[1];
        assert_eq!(old.rating, Rating::Text("good".to_string()));
        assert_eq!(
            old.totals,
            CategoryTotals {
                screen_time_total: 601,
                communication: 120,
                audio: 0,
                productive: 480,
                other: 0,
            }
        );

        let found = db.query_containing("ol").unwrap();
        assert_eq!(messages(&found), vec!["old"]);
        let found = db.query_by_field_str("day_productive", ">", "0:05:00").unwrap();
        assert_eq!(messages(&found), vec!["old"]);
    }

    #[test]
    fn free_text_rating_roundtrips() {
        let mut db = Database::open_in_memory().unwrap();
        let mut original = entry("words", 0, 0);
        original.rating = Rating::from("better than yesterday");
        db.insert_entry(&original).unwrap();

        assert_eq!(db.query_all().unwrap(), vec![original]);
    }
}
