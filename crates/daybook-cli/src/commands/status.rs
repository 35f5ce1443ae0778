//! Status command for showing where entries and usage data live.

use std::io::Write;

use anyhow::Result;
use daybook_store::Database;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config) -> Result<()> {
    let count = db.count_entries()?;

    writeln!(writer, "Daybook status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Entries: {count}")?;

    let knowledge = &config.knowledge_db_path;
    let state = if knowledge.exists() { "found" } else { "missing" };
    writeln!(writer, "Usage log: {} ({state})", knowledge.display())?;

    Ok(())
}
