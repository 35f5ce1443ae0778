//! Init-db command for creating the diary database.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use daybook_store::Database;

/// Runs the init-db command.
///
/// Opening the database already creates the schema; this reports the result.
pub fn run<W: Write>(writer: &mut W, db: &Database, path: &Path) -> Result<()> {
    let count = db.count_entries()?;
    writeln!(writer, "Database ready: {}", path.display())?;
    writeln!(writer, "Entries: {count}")?;
    Ok(())
}
