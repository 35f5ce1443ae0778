//! Diary entries and the environmental readings embedded in them.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::category::CategoryTotals;

/// Place name stored when reverse geocoding returns no address.
pub const LOCATION_NOT_FOUND: &str = "Not found";

/// Storage format of [`DiaryEntry::created_date`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage format of [`DiaryEntry::created_time`].
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Coordinates rounded to two decimal places, as sent to the forecast service.
    #[must_use]
    pub fn rounded(self) -> Self {
        Self {
            lat: (self.lat * 100.0).round() / 100.0,
            lng: (self.lng * 100.0).round() / 100.0,
        }
    }
}

/// Renders as `[lat, lng]`, the stored `location` column format.
impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lat, self.lng)
    }
}

/// Result of location resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coordinates: Coordinates,
    pub name: String,
}

/// Current-hour weather sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    /// Degrees Celsius at 2m.
    pub temperature: f64,
    /// Total cloud cover, percent.
    pub cloud_cover: f64,
}

/// The user's rating of the day.
///
/// Usually a whole number, but free text is kept as typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rating {
    Score(i64),
    Text(String),
}

impl From<i64> for Rating {
    fn from(score: i64) -> Self {
        Self::Score(score)
    }
}

/// Input that parses as an integer becomes a score.
impl From<&str> for Rating {
    fn from(input: &str) -> Self {
        input
            .trim()
            .parse()
            .map_or_else(|_| Self::Text(input.to_string()), Self::Score)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Score(score) => write!(f, "{score}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// User-supplied part of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub message: String,
    pub feeling: String,
    pub rating: Rating,
}

/// A complete diary entry, one row of the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub message: String,
    pub feeling: String,
    pub rating: Rating,
    /// Coordinates as text, e.g. `[51.5085, -0.1257]`.
    pub location: String,
    pub location_name: String,
    pub created_date: NaiveDate,
    pub created_time: NaiveDateTime,
    pub totals: CategoryTotals,
    pub temperature: f64,
    pub cloud_cover: f64,
}

impl DiaryEntry {
    /// Assembles an entry from its independently resolved parts.
    pub fn assemble(
        draft: EntryDraft,
        location: Location,
        weather: Weather,
        totals: CategoryTotals,
        created_time: NaiveDateTime,
    ) -> Self {
        Self {
            message: draft.message,
            feeling: draft.feeling,
            rating: draft.rating,
            location: location.coordinates.to_string(),
            location_name: location.name,
            created_date: created_time.date(),
            created_time,
            totals,
            temperature: weather.temperature,
            cloud_cover: weather.cloud_cover,
        }
    }
}
