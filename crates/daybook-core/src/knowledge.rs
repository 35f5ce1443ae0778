//! Reader for the macOS Knowledge database (`knowledgeC.db`).
//!
//! App usage lives in `ZOBJECT` rows tagged with the `/app/usage` stream.
//! Core Data stores timestamps as seconds since 2001-01-01 UTC; every
//! timestamp read here is shifted by [`APPLE_EPOCH_OFFSET`] onto the Unix
//! epoch before it leaves this module.
//!
//! The schema belongs to the OS and changes between releases, so the device
//! metadata columns are probed with `PRAGMA table_info` and read as NULL when
//! absent. The columns the categorizer needs are mandatory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};

use crate::usage::{SourceError, UsageEvent, UsageSource};

/// Seconds between the Unix epoch and the Core Data epoch (2001-01-01 UTC).
pub const APPLE_EPOCH_OFFSET: i64 = 978_307_200;

/// Stream name of foreground app usage intervals.
pub const APP_USAGE_STREAM: &str = "/app/usage";

const REQUIRED_OBJECT_COLUMNS: [&str; 5] = [
    "ZVALUESTRING",
    "ZSTARTDATE",
    "ZENDDATE",
    "ZCREATIONDATE",
    "ZSTREAMNAME",
];

/// Usage source backed by a Knowledge database on disk.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    path: PathBuf,
}

#[derive(Debug)]
struct RawUsageRow {
    app: Option<String>,
    start: Option<f64>,
    end: Option<f64>,
    created: Option<f64>,
    tz: Option<i64>,
    device_id: Option<String>,
    device_model: Option<String>,
}

impl KnowledgeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, SourceError> {
        if !self.path.exists() {
            return Err(SourceError::NotFound {
                path: self.path.clone(),
            });
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }
}

impl UsageSource for KnowledgeStore {
    fn fetch_events(&self) -> Result<Vec<UsageEvent>, SourceError> {
        let conn = self.open()?;
        let query = build_usage_query(&conn)?;
        tracing::debug!(path = %self.path.display(), "reading app usage");

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([APP_USAGE_STREAM], |row| {
            Ok(RawUsageRow {
                app: row.get(0)?,
                start: row.get(1)?,
                end: row.get(2)?,
                created: row.get(3)?,
                tz: row.get(4)?,
                device_id: row.get(5)?,
                device_model: row.get(6)?,
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            if let Some(event) = row?.into_event() {
                events.push(event);
            }
        }
        tracing::debug!(count = events.len(), "read app usage events");
        Ok(events)
    }
}

impl RawUsageRow {
    fn into_event(self) -> Option<UsageEvent> {
        let (Some(start), Some(end), Some(created)) = (
            self.start.and_then(apple_to_utc),
            self.end.and_then(apple_to_utc),
            self.created.and_then(apple_to_utc),
        ) else {
            tracing::warn!(app = ?self.app, "skipping usage row with missing timestamps");
            return None;
        };
        if end < start {
            tracing::warn!(app = ?self.app, %start, %end, "skipping usage row ending before it starts");
            return None;
        }

        let mut event = UsageEvent::new(self.app.unwrap_or_default(), start, end, created);
        event.timezone_offset_seconds = self.tz;
        event.device_id = self.device_id;
        event.device_model = self.device_model;
        Some(event)
    }
}

/// Converts a Core Data timestamp into UTC.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn apple_to_utc(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    let unix = (whole as i64).checked_add(APPLE_EPOCH_OFFSET)?;
    DateTime::from_timestamp(unix, nanos.min(999_999_999))
}

fn build_usage_query(conn: &Connection) -> Result<String, SourceError> {
    let object_columns = table_columns(conn, "ZOBJECT")?;
    if object_columns.is_empty() {
        return Err(SourceError::Schema("missing table ZOBJECT".to_string()));
    }
    for column in REQUIRED_OBJECT_COLUMNS {
        if !object_columns.contains(column) {
            return Err(SourceError::Schema(format!("missing column ZOBJECT.{column}")));
        }
    }

    let tz = if object_columns.contains("ZSECONDSFROMGMT") {
        "o.ZSECONDSFROMGMT"
    } else {
        "NULL"
    };

    let source_columns = table_columns(conn, "ZSOURCE")?;
    let has_source =
        object_columns.contains("ZSOURCE") && source_columns.contains("ZDEVICEID");
    let peer_columns = table_columns(conn, "ZSYNCPEER")?;
    let has_peer =
        has_source && peer_columns.contains("ZDEVICEID") && peer_columns.contains("ZMODEL");

    let mut joins = String::new();
    if has_source {
        joins.push_str(" LEFT JOIN ZSOURCE s ON o.ZSOURCE = s.Z_PK");
    }
    if has_peer {
        joins.push_str(" LEFT JOIN ZSYNCPEER p ON s.ZDEVICEID = p.ZDEVICEID");
    }
    let device_id = if has_source { "s.ZDEVICEID" } else { "NULL" };
    let device_model = if has_peer { "p.ZMODEL" } else { "NULL" };

    Ok(format!(
        "
        SELECT o.ZVALUESTRING, o.ZSTARTDATE, o.ZENDDATE, o.ZCREATIONDATE,
               {tz}, {device_id}, {device_model}
        FROM ZOBJECT o{joins}
        WHERE o.ZSTREAMNAME = ?
        ORDER BY o.ZSTARTDATE DESC
        "
    ))
}

/// Column names of `table`, empty when the table does not exist.
fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>, SourceError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut columns = HashSet::new();
    for row in rows {
        columns.insert(row?);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    /// 2025-03-01T08:00:00Z in Core Data seconds.
    const MORNING: f64 = 762_508_800.0;

    fn create_knowledge_fixture(dir: &Path, with_peer: bool) -> PathBuf {
        let path = dir.join("knowledgeC.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "
            CREATE TABLE ZOBJECT (
                Z_PK INTEGER PRIMARY KEY,
                ZVALUESTRING VARCHAR,
                ZSTARTDATE TIMESTAMP,
                ZENDDATE TIMESTAMP,
                ZCREATIONDATE TIMESTAMP,
                ZSECONDSFROMGMT INTEGER,
                ZSTREAMNAME VARCHAR,
                ZSOURCE INTEGER
            );
            CREATE TABLE ZSOURCE (Z_PK INTEGER PRIMARY KEY, ZDEVICEID VARCHAR);
            INSERT INTO ZSOURCE VALUES (1, 'device-1');
            ",
        )
        .unwrap();
        if with_peer {
            conn.execute_batch(
                "
                CREATE TABLE ZSYNCPEER (Z_PK INTEGER PRIMARY KEY, ZDEVICEID VARCHAR, ZMODEL VARCHAR);
                INSERT INTO ZSYNCPEER VALUES (1, 'device-1', 'MacBookPro18,1');
                ",
            )
            .unwrap();
        }
        conn.execute(
            "INSERT INTO ZOBJECT VALUES (1, 'com.apple.Music', ?1, ?2, ?2, 3600, '/app/usage', 1)",
            rusqlite::params![MORNING, MORNING + 600.0],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO ZOBJECT VALUES (2, 'com.hnc.Discord', ?1, ?2, ?2, 3600, '/app/usage', 1)",
            rusqlite::params![MORNING + 3600.0, MORNING + 3900.0],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO ZOBJECT VALUES (3, 'com.apple.Safari', ?1, ?2, ?2, 3600, '/safari/history', 1)",
            rusqlite::params![MORNING, MORNING + 60.0],
        )
        .unwrap();
        path
    }

    #[test]
    fn apple_epoch_is_normalized() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(apple_to_utc(MORNING), Some(expected));
        assert_eq!(
            apple_to_utc(0.0),
            Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).single()
        );
        assert_eq!(apple_to_utc(f64::NAN), None);
        assert_eq!(apple_to_utc(1e300), None);
        assert_eq!(apple_to_utc(-1e300), None);
    }

    #[test]
    fn fetch_events_reads_app_usage_stream_newest_first() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::new(create_knowledge_fixture(temp.path(), true));

        let events = store.fetch_events().unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].app_id, "com.hnc.Discord");
        assert_eq!(events[0].duration_seconds, 300);
        assert_eq!(events[1].app_id, "com.apple.Music");
        assert_eq!(events[1].duration_seconds, 600);
        assert_eq!(
            events[1].start_time,
            Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
        );
        assert_eq!(events[1].timezone_offset_seconds, Some(3600));
        assert_eq!(events[1].device_id.as_deref(), Some("device-1"));
        assert_eq!(events[1].device_model.as_deref(), Some("MacBookPro18,1"));
    }

    #[test]
    fn fetch_events_tolerates_missing_device_metadata() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::new(create_knowledge_fixture(temp.path(), false));

        let events = store.fetch_events().unwrap();

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.device_model.is_none()));
        assert_eq!(events[0].device_id.as_deref(), Some("device-1"));
    }

    #[test]
    fn fetch_events_skips_rows_ending_before_start() {
        let temp = TempDir::new().unwrap();
        let path = create_knowledge_fixture(temp.path(), true);
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO ZOBJECT VALUES (4, 'com.broken', ?1, ?2, ?2, 0, '/app/usage', 1)",
            rusqlite::params![MORNING + 100.0, MORNING],
        )
        .unwrap();

        let events = KnowledgeStore::new(path).fetch_events().unwrap();
        assert!(events.iter().all(|e| e.app_id != "com.broken"));
    }

    #[test]
    fn fetch_events_skips_rows_with_out_of_range_timestamps() {
        let temp = TempDir::new().unwrap();
        let path = create_knowledge_fixture(temp.path(), true);
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO ZOBJECT VALUES (4, 'com.corrupt', ?1, ?2, ?2, 0, '/app/usage', 1)",
            rusqlite::params![MORNING, 1e300],
        )
        .unwrap();

        let events = KnowledgeStore::new(path).fetch_events().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.app_id != "com.corrupt"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::new(temp.path().join("absent.db"));
        assert!(matches!(
            store.fetch_events(),
            Err(SourceError::NotFound { .. })
        ));
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("knowledgeC.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE ZOBJECT (Z_PK INTEGER PRIMARY KEY, ZVALUESTRING VARCHAR);")
            .unwrap();
        drop(conn);

        let err = KnowledgeStore::new(path).fetch_events().unwrap_err();
        assert!(matches!(err, SourceError::Schema(_)), "got {err:?}");
    }
}
