//! Per-application foreground usage events.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading a usage log.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The usage log does not exist at the configured path.
    #[error("usage log not found at {}", path.display())]
    NotFound { path: PathBuf },
    /// The usage log could not be opened or queried.
    #[error("usage log unavailable: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The usage log is missing a table or column this reader depends on.
    #[error("unexpected usage log schema: {0}")]
    Schema(String),
}

/// One foreground interval of a single application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Bundle identifier, e.g. `com.apple.Music`.
    pub app_id: String,
    /// `end_time - start_time`, in seconds.
    pub duration_seconds: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// When the log recorded the interval. Day attribution uses this field.
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_offset_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
}

impl UsageEvent {
    /// Creates an event without device metadata.
    pub fn new(
        app_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            duration_seconds: end_time.signed_duration_since(start_time).num_seconds(),
            start_time,
            end_time,
            created_at,
            timezone_offset_seconds: None,
            device_id: None,
            device_model: None,
        }
    }
}

/// A read-only provider of usage events.
///
/// Implementations return events ordered by `start_time` descending.
pub trait UsageSource {
    fn fetch_events(&self) -> Result<Vec<UsageEvent>, SourceError>;
}

/// An in-memory source, mostly useful in tests and dry runs.
impl UsageSource for [UsageEvent] {
    fn fetch_events(&self) -> Result<Vec<UsageEvent>, SourceError> {
        let mut events = self.to_vec();
        events.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(events)
    }
}

impl UsageSource for Vec<UsageEvent> {
    fn fetch_events(&self) -> Result<Vec<UsageEvent>, SourceError> {
        self.as_slice().fetch_events()
    }
}
