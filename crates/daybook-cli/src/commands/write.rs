//! Write command: builds an enriched entry and stores it.

use std::io::Write;

use anyhow::{Context, Result};
use daybook_context::{ContextClient, EntryBuilder};
use daybook_core::{DiaryEntry, EntryDraft, KnowledgeStore};
use daybook_store::Database;

use crate::Config;

/// Runs the write command.
///
/// The entry is stored only once every lookup has succeeded.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    config: &Config,
    draft: EntryDraft,
) -> Result<DiaryEntry> {
    writeln!(writer, "Writing entry to database.")?;

    let categories = config
        .category_table()
        .context("invalid [categories] configuration")?;
    let client =
        ContextClient::new(config.services.clone()).context("failed to create HTTP client")?;
    let source = KnowledgeStore::new(&config.knowledge_db_path);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio runtime")?;
    let entry = runtime
        .block_on(EntryBuilder::new(&client, &categories).build_entry(&source, draft))
        .context("failed to build entry")?;

    db.insert_entry(&entry).context("failed to store entry")?;
    writeln!(
        writer,
        "Saved entry for {} in {}.",
        entry.created_date, entry.location_name
    )?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    use daybook_core::Rating;

    #[test]
    fn missing_usage_log_stores_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("diary.db"),
            knowledge_db_path: temp.path().join("knowledgeC.db"),
            ..Config::default()
        };
        let mut db = Database::open(&config.database_path).unwrap();
        let draft = EntryDraft {
            message: "offline".to_string(),
            feeling: "meh".to_string(),
            rating: Rating::Score(4),
        };

        let mut output = Vec::new();
        let err = run(&mut output, &mut db, &config, draft).unwrap_err();

        assert!(format!("{err:#}").contains("usage log not found"), "{err:#}");
        assert_eq!(db.count_entries().unwrap(), 0);
    }
}
