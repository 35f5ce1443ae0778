//! Categories command for listing the app-to-category table.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::Config;

#[derive(Serialize)]
struct CategoryListing<'a> {
    category: &'a str,
    apps: &'a [String],
}

/// Prints each category with its app identifiers.
pub fn run<W: Write>(writer: &mut W, config: &Config, json: bool) -> Result<()> {
    let table = config
        .category_table()
        .context("invalid [categories] configuration")?;
    let lists = table.to_lists();

    if json {
        let listing: Vec<CategoryListing<'_>> = lists
            .iter()
            .map(|(category, apps)| CategoryListing { category, apps })
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&listing)?)?;
        return Ok(());
    }

    for (category, apps) in &lists {
        writeln!(writer, "{category}:")?;
        for app in apps {
            writeln!(writer, "  {app}")?;
        }
    }
    writeln!(writer, "Anything else counts as other.")?;
    Ok(())
}
