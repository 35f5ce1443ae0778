//! Daybook CLI library.
//!
//! This crate provides the CLI interface for daybook.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, ReadQuery};
pub use config::Config;
