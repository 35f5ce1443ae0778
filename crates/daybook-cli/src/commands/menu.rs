//! Interactive menu over stdin/stdout.

use std::io::{BufRead, Write};

use anyhow::Result;
use daybook_core::{EntryDraft, EntryField, Rating};
use daybook_store::Database;

use super::{read, write};
use crate::{Config, ReadQuery};

/// Typed at any write prompt to abandon the entry.
const CANCEL: &str = "x";

/// Runs the menu until the user exits or input ends.
///
/// Failed writes and rejected queries are reported and the loop continues.
pub fn run<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    db: &mut Database,
    config: &Config,
) -> Result<()> {
    loop {
        writeln!(output, "1. Write")?;
        writeln!(output, "2. Read")?;
        writeln!(output, "3. Exit")?;
        let Some(choice) = prompt(input)? else {
            return Ok(());
        };
        match choice.as_str() {
            "1" => {
                let Some(draft) = ask_draft(input, output)? else {
                    continue;
                };
                if let Err(err) = write::run(output, db, config, draft) {
                    tracing::warn!(error = %err, "write failed");
                    writeln!(output, "Failed to write entry: {err:#}")?;
                }
            }
            "2" => {
                let Some(query) = ask_query(input, output)? else {
                    return Ok(());
                };
                match read::select(db, &query) {
                    Ok(entries) => read::write_entries(output, &entries)?,
                    Err(err) => writeln!(output, "Query failed: {err:#}")?,
                }
            }
            _ => return Ok(()),
        }
    }
}

/// Reads one line without its terminator. `None` at end of input.
fn prompt<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn ask_draft<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Option<EntryDraft>> {
    writeln!(output, "({CANCEL} to cancel)")?;

    writeln!(output, "MESSAGE:")?;
    let Some(message) = prompt(input)?.filter(|s| s != CANCEL) else {
        return Ok(None);
    };
    writeln!(output, "FEELING:")?;
    let Some(feeling) = prompt(input)?.filter(|s| s != CANCEL) else {
        return Ok(None);
    };
    writeln!(output, "RATING:")?;
    let Some(rating) = prompt(input)?.filter(|s| s != CANCEL) else {
        return Ok(None);
    };
    Ok(Some(EntryDraft {
        message,
        feeling,
        rating: Rating::from(rating.as_str()),
    }))
}

fn ask_query<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Option<ReadQuery>> {
    writeln!(output, "1. Search by data")?;
    writeln!(output, "2. Search by string")?;
    writeln!(output, "3. Show all")?;
    let Some(choice) = prompt(input)? else {
        return Ok(None);
    };
    let query = match choice.as_str() {
        "1" => {
            writeln!(output, "Input data type.")?;
            for field in EntryField::ALL {
                writeln!(output, "{field}")?;
            }
            let Some(field) = prompt(input)? else {
                return Ok(None);
            };
            writeln!(output, "Input operator. (<, <=, =, >, >=, <>)")?;
            let Some(op) = prompt(input)? else {
                return Ok(None);
            };
            writeln!(output, "Input value. (H:M:S for day_* fields)")?;
            let Some(value) = prompt(input)? else {
                return Ok(None);
            };
            ReadQuery::Field { field, op, value }
        }
        "2" => {
            writeln!(output, "Search all entries containing string:")?;
            let Some(text) = prompt(input)? else {
                return Ok(None);
            };
            ReadQuery::Search { text }
        }
        _ => ReadQuery::All,
    };
    Ok(Some(query))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;
    use daybook_core::{CategoryTotals, DiaryEntry, Rating};

    fn seeded() -> Database {
        let created_time = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_micro_opt(8, 0, 0, 0)
            .unwrap();
        let mut db = Database::open_in_memory().unwrap();
        for (message, rating) in [("it rained today", 3), ("sunny", 9)] {
            db.insert_entry(&DiaryEntry {
                message: message.to_string(),
                feeling: "ok".to_string(),
                rating: Rating::Score(rating),
                location: "[0, 0]".to_string(),
                location_name: "Not found".to_string(),
                created_date: created_time.date(),
                created_time,
                totals: CategoryTotals::default(),
                temperature: 10.0,
                cloud_cover: 0.0,
            })
            .unwrap();
        }
        db
    }

    fn session(script: &str) -> (String, Database) {
        let mut db = seeded();
        let mut output = Vec::new();
        run(&mut script.as_bytes(), &mut output, &mut db, &Config::default()).unwrap();
        (String::from_utf8(output).unwrap(), db)
    }

    #[test]
    fn exit_stops_immediately() {
        let (output, _) = session("3\n");
        assert_eq!(output, "1. Write\n2. Read\n3. Exit\n");
    }

    #[test]
    fn end_of_input_exits() {
        let (output, _) = session("");
        assert!(output.ends_with("3. Exit\n"));
    }

    #[test]
    fn cancelled_write_stores_nothing() {
        let (output, db) = session("1\nfirst line\nx\n3\n");
        assert!(output.contains("FEELING:"));
        assert!(!output.contains("RATING:"));
        assert_eq!(db.count_entries().unwrap(), 2);
    }

    #[test]
    fn draft_accepts_free_text_rating() {
        let mut output = Vec::new();
        let draft = ask_draft(&mut "long day\ntired\nnot great\n".as_bytes(), &mut output)
            .unwrap()
            .unwrap();
        assert_eq!(draft.message, "long day");
        assert_eq!(draft.rating, Rating::Text("not great".to_string()));

        let draft = ask_draft(&mut "a\nb\n7\n".as_bytes(), &mut output)
            .unwrap()
            .unwrap();
        assert_eq!(draft.rating, Rating::Score(7));
    }

    #[test]
    fn read_by_field() {
        let (output, _) = session("2\n1\nRATING\n>\n5\n3\n");
        assert!(output.contains("Message: sunny"));
        assert!(!output.contains("Message: it rained today"));
    }

    #[test]
    fn read_by_string() {
        let (output, _) = session("2\n2\nrain\n3\n");
        assert!(output.contains("Message: it rained today"));
        assert!(!output.contains("Message: sunny"));
    }

    #[test]
    fn rejected_query_is_reported_and_menu_continues() {
        let (output, _) = session("2\n1\nnope\n=\n1\n3\n");
        assert!(output.contains("Query failed: invalid query: unknown field: nope"));
        assert_eq!(output.matches("3. Exit").count(), 2);
    }

    #[test]
    fn show_all_lists_every_entry() {
        let (output, _) = session("2\n3\n3\n");
        assert_eq!(output.matches("Message: ").count(), 2);
    }
}
