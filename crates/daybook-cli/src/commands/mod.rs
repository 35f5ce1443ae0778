//! CLI subcommand implementations.

pub mod categories;
pub mod init_db;
pub mod menu;
pub mod read;
pub mod status;
pub mod write;
