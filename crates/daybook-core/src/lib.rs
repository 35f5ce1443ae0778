//! Core domain logic for daybook.
//!
//! This crate contains the fundamental types and logic for:
//! - Usage events: reading per-app foreground intervals from the Knowledge database
//! - Categorization: splitting a day's screen time into usage categories
//! - Entries: the flattened diary record and its environmental readings
//! - Queries: validated field predicates over stored entries

pub mod category;
pub mod entry;
pub mod knowledge;
pub mod query;
pub mod usage;

pub use category::{Category, CategoryError, CategoryTable, CategoryTotals, DAY_BOUNDARY_OFFSET};
pub use entry::{Coordinates, DiaryEntry, EntryDraft, LOCATION_NOT_FOUND, Location, Rating, Weather};
pub use knowledge::{APPLE_EPOCH_OFFSET, KnowledgeStore};
pub use query::{Comparison, EntryField, FieldKind, FieldPredicate, QueryError, QueryValue};
pub use usage::{SourceError, UsageEvent, UsageSource};
