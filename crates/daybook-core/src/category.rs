//! Usage categories and the per-day screen time breakdown.
//!
//! Every app identifier maps to at most one [`Category`] through a
//! [`CategoryTable`]. Identifiers missing from the table count as "other",
//! so each included event lands in exactly one bucket and the buckets always
//! sum to the day's total screen time.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::usage::UsageEvent;

/// Offset from local midnight to the start of a diary day, in seconds.
///
/// This is a fixed 7-hour shift and ignores the per-event timezone recorded
/// in the usage log.
pub const DAY_BOUNDARY_OFFSET: i64 = 25_200;

/// Errors in a category configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CategoryError {
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error("app {app_id} is listed under both {first} and {second}")]
    Conflict {
        app_id: String,
        first: Category,
        second: Category,
    },
}

/// A named usage category. Apps outside the table fall into "other".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Communication,
    Audio,
    Productive,
}

impl Category {
    pub const ALL: [Self; 3] = [Self::Communication, Self::Audio, Self::Productive];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Communication => "communication",
            Self::Audio => "audio",
            Self::Productive => "productive",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "communication" => Ok(Self::Communication),
            "audio" => Ok(Self::Audio),
            "productive" => Ok(Self::Productive),
            _ => Err(CategoryError::UnknownCategory(s.to_string())),
        }
    }
}

/// Screen time for one day, split by category. All values are seconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub screen_time_total: i64,
    pub communication: i64,
    pub audio: i64,
    pub productive: i64,
    pub other: i64,
}

impl CategoryTotals {
    fn add(&mut self, category: Option<Category>, seconds: i64) {
        self.screen_time_total += seconds;
        let bucket = match category {
            Some(Category::Communication) => &mut self.communication,
            Some(Category::Audio) => &mut self.audio,
            Some(Category::Productive) => &mut self.productive,
            None => &mut self.other,
        };
        *bucket += seconds;
    }
}

/// Exact-match lookup from app identifier to category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    apps: HashMap<String, Category>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (app_id, category) in [
            ("com.hnc.Discord", Category::Communication),
            ("com.apple.MobileSMS", Category::Communication),
            ("com.apple.Music", Category::Audio),
            ("com.apple.podcasts", Category::Audio),
            ("com.jetbrains.pycharm.ce", Category::Productive),
            ("com.microsoft.VSCode", Category::Productive),
            ("org.blenderfoundation.blender", Category::Productive),
        ] {
            table.insert(app_id, category);
        }
        table
    }
}

impl CategoryTable {
    pub fn empty() -> Self {
        Self {
            apps: HashMap::new(),
        }
    }

    /// Builds a table from `category name -> app identifiers` lists, the
    /// shape used by the `[categories]` config section.
    pub fn from_lists(lists: &BTreeMap<String, Vec<String>>) -> Result<Self, CategoryError> {
        let mut table = Self::empty();
        for (name, app_ids) in lists {
            let category: Category = name.parse()?;
            for app_id in app_ids {
                match table.apps.get(app_id.as_str()) {
                    Some(&existing) if existing != category => {
                        return Err(CategoryError::Conflict {
                            app_id: app_id.clone(),
                            first: existing,
                            second: category,
                        });
                    }
                    _ => table.insert(app_id.clone(), category),
                }
            }
        }
        Ok(table)
    }

    /// Applies configured lists on top of this table.
    ///
    /// A listed category drops its existing apps, and every listed app moves
    /// to its listed category. Categories not mentioned are left alone.
    pub fn with_overrides(
        mut self,
        lists: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, CategoryError> {
        let overrides = Self::from_lists(lists)?;
        let replaced: Vec<Category> = lists
            .keys()
            .map(|name| name.parse())
            .collect::<Result<_, _>>()?;
        self.apps.retain(|_, category| !replaced.contains(category));
        self.apps.extend(overrides.apps);
        Ok(self)
    }

    /// Inverse of [`CategoryTable::from_lists`], with sorted identifiers.
    pub fn to_lists(&self) -> BTreeMap<String, Vec<String>> {
        let mut lists: BTreeMap<String, Vec<String>> = Category::ALL
            .iter()
            .map(|c| (c.to_string(), Vec::new()))
            .collect();
        for (app_id, category) in &self.apps {
            lists
                .entry(category.to_string())
                .or_default()
                .push(app_id.clone());
        }
        for app_ids in lists.values_mut() {
            app_ids.sort();
        }
        lists
    }

    pub fn insert(&mut self, app_id: impl Into<String>, category: Category) {
        self.apps.insert(app_id.into(), category);
    }

    pub fn category_of(&self, app_id: &str) -> Option<Category> {
        self.apps.get(app_id).copied()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Totals for `target_date`, using the system timezone for midnight.
    pub fn categorize(&self, events: &[UsageEvent], target_date: NaiveDate) -> CategoryTotals {
        self.categorize_since(events, day_threshold_in(&Local, target_date))
    }

    /// Totals over events created strictly after `threshold`.
    pub fn categorize_since(
        &self,
        events: &[UsageEvent],
        threshold: DateTime<Utc>,
    ) -> CategoryTotals {
        let mut totals = CategoryTotals::default();
        let mut included = 0usize;
        for event in events.iter().filter(|e| e.created_at > threshold) {
            totals.add(self.category_of(&event.app_id), event.duration_seconds);
            included += 1;
        }
        tracing::debug!(%threshold, included, ?totals, "categorized usage events");
        totals
    }
}

/// The instant a diary day begins: local midnight plus [`DAY_BOUNDARY_OFFSET`].
pub fn day_threshold_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    midnight_to_utc(tz, date) + Duration::seconds(DAY_BOUNDARY_OFFSET)
}

/// Converts midnight of `date` in `tz` to UTC.
/// Ambiguous midnights take the earlier instant; a skipped midnight uses 1am.
fn midnight_to_utc<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            let one_am = midnight + Duration::hours(1);
            tz.from_local_datetime(&one_am)
                .earliest()
                .map_or_else(|| Utc.from_utc_datetime(&midnight), |dt| dt.with_timezone(&Utc))
        }
    }
}
