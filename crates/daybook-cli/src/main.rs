use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use daybook_cli::commands::{categories, init_db, menu, read, status, write};
use daybook_cli::{Cli, Commands, Config};
use daybook_core::{EntryDraft, Rating};
use daybook_store::Database;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = load_config(config_path)?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path).with_context(|| {
        format!("failed to open {}", config.database_path.display())
    })?;
    Ok((db, config))
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::InitDb) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            init_db::run(&mut out, &db, &config.database_path)?;
        }
        Some(Commands::Write {
            message,
            feeling,
            rating,
        }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            let draft = EntryDraft {
                message: message.clone(),
                feeling: feeling.clone(),
                rating: Rating::from(rating.as_str()),
            };
            write::run(&mut out, &mut db, &config, draft)?;
        }
        Some(Commands::Read { json, query }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            read::run(&mut out, &db, query, *json)?;
        }
        Some(Commands::Menu) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            let stdin = io::stdin();
            menu::run(&mut stdin.lock(), &mut out, &mut db, &config)?;
        }
        Some(Commands::Categories { json }) => {
            let config = load_config(cli.config.as_deref())?;
            categories::run(&mut out, &config, *json)?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut out, &db, &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
