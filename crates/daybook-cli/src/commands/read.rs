//! Read command: selects entries and renders them.

use std::io::Write;

use anyhow::Result;
use daybook_core::DiaryEntry;
use daybook_core::entry::TIME_FORMAT;
use daybook_core::query::format_hms;
use daybook_store::Database;

use crate::ReadQuery;

const SEPARATOR: &str = "-------------------";

/// Runs the read command.
pub fn run<W: Write>(writer: &mut W, db: &Database, query: &ReadQuery, json: bool) -> Result<()> {
    let entries = select(db, query)?;
    tracing::debug!(count = entries.len(), ?query, "selected entries");
    if json {
        write_json(writer, &entries)
    } else {
        write_entries(writer, &entries)
    }
}

pub fn select(db: &Database, query: &ReadQuery) -> Result<Vec<DiaryEntry>> {
    let entries = match query {
        ReadQuery::All => db.query_all()?,
        ReadQuery::Search { text } => db.query_containing(text)?,
        ReadQuery::Field { field, op, value } => db.query_by_field_str(field, op, value)?,
    };
    Ok(entries)
}

/// Writes entries as human-readable blocks.
pub fn write_entries<W: Write>(writer: &mut W, entries: &[DiaryEntry]) -> Result<()> {
    if entries.is_empty() {
        writeln!(writer, "No entries found.")?;
        return Ok(());
    }
    for entry in entries {
        writeln!(writer, "Message: {}", entry.message)?;
        writeln!(writer, "Feeling: {}", entry.feeling)?;
        writeln!(writer, "Rating: {}", entry.rating)?;
        writeln!(writer, "Date/time: {}", entry.created_time.format(TIME_FORMAT))?;
        writeln!(writer, "Location: {}", entry.location_name)?;
        writeln!(writer, "Location Coordinates: {}", entry.location)?;
        writeln!(writer, "Weather: {}°C", entry.temperature)?;
        writeln!(writer, "Cloud cover: {}%", entry.cloud_cover)?;
        let totals = &entry.totals;
        writeln!(writer, "Day Screen Time: {}", format_hms(totals.screen_time_total))?;
        writeln!(writer, "Day Communication: {}", format_hms(totals.communication))?;
        writeln!(writer, "Day Audio: {}", format_hms(totals.audio))?;
        writeln!(writer, "Day Productive: {}", format_hms(totals.productive))?;
        writeln!(writer, "Day Other: {}", format_hms(totals.other))?;
        writeln!(writer, "\n{SEPARATOR}\n")?;
    }
    Ok(())
}

fn write_json<W: Write>(writer: &mut W, entries: &[DiaryEntry]) -> Result<()> {
    for entry in entries {
        writeln!(writer, "{}", serde_json::to_string(entry)?)?;
    }
    Ok(())
}
