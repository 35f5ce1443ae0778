//! Configuration loading and management.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use daybook_context::ServiceConfig;
use daybook_core::{CategoryError, CategoryTable};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the diary database file.
    pub database_path: PathBuf,

    /// Path to the macOS Knowledge database holding app usage.
    pub knowledge_db_path: PathBuf,

    /// Location and weather endpoints.
    #[serde(default)]
    pub services: ServiceConfig,

    /// App identifiers per category, e.g. `audio = ["com.apple.Music"]`.
    ///
    /// Applied over the built-in table: a listed category replaces that
    /// category's defaults, and a listed app leaves whatever category it had.
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("diary.db"),
            knowledge_db_path: home.join("Library/Application Support/Knowledge/knowledgeC.db"),
            services: ServiceConfig::default(),
            categories: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Sources are merged in order: defaults, `~/.config/daybook/config.toml`,
    /// `config_path`, then `DAYBOOK_*` environment variables (nested keys use
    /// `__`, e.g. `DAYBOOK_SERVICES__TIMEOUT_SECS`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("DAYBOOK_").split("__"));

        figment.extract()
    }

    /// Builds the category lookup: the built-in table with `categories` applied.
    pub fn category_table(&self) -> Result<CategoryTable, CategoryError> {
        CategoryTable::default().with_overrides(&self.categories)
    }
}

/// Returns the platform-specific config directory for daybook.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("daybook"))
}

/// Returns the platform-specific data directory for daybook.
///
/// On Linux: `~/.local/share/daybook`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("daybook"))
}
