//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Personal diary with ambient context.
///
/// Each entry records where you were, the weather, and how the day's
/// screen time split across communication, audio and productive apps.
#[derive(Debug, Parser)]
#[command(name = "daybook", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the diary database if it does not exist.
    InitDb,

    /// Write a new entry.
    Write {
        /// What happened today.
        #[arg(short, long)]
        message: String,

        /// How you feel.
        #[arg(short, long)]
        feeling: String,

        /// Rating for the day, usually a number.
        #[arg(short, long, allow_hyphen_values = true)]
        rating: String,
    },

    /// Read stored entries.
    Read {
        /// Output one JSON object per entry instead of text blocks.
        #[arg(long)]
        json: bool,

        #[command(subcommand)]
        query: ReadQuery,
    },

    /// Interactive write/read menu.
    Menu,

    /// Show which apps count toward each usage category.
    Categories {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show database location and entry count.
    Status,
}

/// Ways to select entries.
#[derive(Debug, Clone, Subcommand)]
pub enum ReadQuery {
    /// Every entry, oldest first.
    All,

    /// Entries whose message contains TEXT (case-sensitive).
    Search {
        text: String,
    },

    /// Entries where FIELD compares to VALUE.
    ///
    /// Duration fields (day_*) accept H:M:S or seconds.
    Field {
        /// Column name, e.g. rating, date, temperature, day_audio.
        field: String,

        /// One of <, <=, =, >, >=, <>.
        op: String,

        #[arg(allow_hyphen_values = true)]
        value: String,
    },
}
