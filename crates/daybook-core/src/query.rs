//! Validated field predicates over stored entries.
//!
//! User input names a field, an operator and a value as free text. Each part
//! is resolved against a closed set here, so the store only ever sees a
//! known column, a known operator and a typed value.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pre-compiled regex for `H:M:S` duration literals.
static HMS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+):(\d+):(\d+)\s*$").unwrap());

/// Rejected query input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
    #[error("invalid value for {field}: {value:?} (expected {expected})")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// How a field's value is typed in queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    /// Whole seconds, also accepted as an `H:M:S` literal.
    Duration,
    Real,
}

/// A column of the `entries` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryField {
    Message,
    Feeling,
    Rating,
    Location,
    Date,
    Time,
    DayScreentime,
    DayCommunication,
    DayAudio,
    DayProductive,
    DayOther,
    Temp,
    CloudCover,
    LocationName,
}

impl EntryField {
    /// All fields in storage column order.
    pub const ALL: [Self; 14] = [
        Self::Message,
        Self::Feeling,
        Self::Rating,
        Self::Location,
        Self::Date,
        Self::Time,
        Self::DayScreentime,
        Self::DayCommunication,
        Self::DayAudio,
        Self::DayProductive,
        Self::DayOther,
        Self::Temp,
        Self::CloudCover,
        Self::LocationName,
    ];

    pub const fn column(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Feeling => "feeling",
            Self::Rating => "rating",
            Self::Location => "location",
            Self::Date => "date",
            Self::Time => "time",
            Self::DayScreentime => "day_screentime",
            Self::DayCommunication => "day_communication",
            Self::DayAudio => "day_audio",
            Self::DayProductive => "day_productive",
            Self::DayOther => "day_other",
            Self::Temp => "temp",
            Self::CloudCover => "cloud_cover",
            Self::LocationName => "location_name",
        }
    }

    pub const fn kind(self) -> FieldKind {
        match self {
            Self::Message
            | Self::Feeling
            | Self::Location
            | Self::Date
            | Self::Time
            | Self::LocationName => FieldKind::Text,
            Self::Rating => FieldKind::Integer,
            Self::DayScreentime
            | Self::DayCommunication
            | Self::DayAudio
            | Self::DayProductive
            | Self::DayOther => FieldKind::Duration,
            Self::Temp | Self::CloudCover => FieldKind::Real,
        }
    }
}

impl fmt::Display for EntryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for EntryField {
    type Err = QueryError;

    /// Case-insensitive. Also accepts the interactive menu labels
    /// `temperature` and `day_screen_time`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let field = match name.as_str() {
            "temperature" => Self::Temp,
            "day_screen_time" => Self::DayScreentime,
            other => Self::ALL
                .into_iter()
                .find(|field| field.column() == other)
                .ok_or_else(|| QueryError::UnknownField(s.to_string()))?,
        };
        Ok(field)
    }
}

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Lt,
    Le,
    Eq,
    Gt,
    Ge,
    Ne,
}

impl Comparison {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Ne => "<>",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Comparison {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            "=" | "==" => Ok(Self::Eq),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            "<>" | "!=" => Ok(Self::Ne),
            _ => Err(QueryError::UnknownOperator(s.to_string())),
        }
    }
}

/// A typed query operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

/// `field op value`, validated against the entry schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPredicate {
    pub field: EntryField,
    pub op: Comparison,
    pub value: QueryValue,
}

impl FieldPredicate {
    /// Parses raw user input into a predicate.
    pub fn parse(field: &str, op: &str, value: &str) -> Result<Self, QueryError> {
        let field: EntryField = field.parse()?;
        let op: Comparison = op.parse()?;
        let value = parse_value(field, value)?;
        Ok(Self { field, op, value })
    }
}

fn parse_value(field: EntryField, raw: &str) -> Result<QueryValue, QueryError> {
    let invalid = |expected| QueryError::InvalidValue {
        field: field.column(),
        value: raw.to_string(),
        expected,
    };
    match field.kind() {
        FieldKind::Text => Ok(QueryValue::Text(raw.to_string())),
        FieldKind::Integer => raw
            .trim()
            .parse()
            .map(QueryValue::Integer)
            .map_err(|_| invalid("an integer")),
        FieldKind::Duration => {
            let seconds = if raw.contains(':') {
                parse_hms(raw)
            } else {
                raw.trim().parse().ok()
            };
            seconds
                .map(QueryValue::Integer)
                .ok_or_else(|| invalid("seconds or H:M:S"))
        }
        FieldKind::Real => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(QueryValue::Real)
            .ok_or_else(|| invalid("a number")),
    }
}

/// Converts an `H:M:S` literal to seconds. Components are not range-checked.
pub fn parse_hms(s: &str) -> Option<i64> {
    let caps = HMS_RE.captures(s)?;
    let hours: i64 = caps[1].parse().ok()?;
    let minutes: i64 = caps[2].parse().ok()?;
    let seconds: i64 = caps[3].parse().ok()?;
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

/// Formats seconds as `H:MM:SS`. Negative values render as zero.
pub fn format_hms(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
