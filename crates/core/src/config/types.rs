use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::composer::ComposerConfig;
use crate::manager::ManagerConfig;
use crate::render::RenderConfig;
use crate::timing::TimingConfig;

/// Root configuration. Every section is optional in the TOML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub composer: ComposerConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:` for a throwaway store.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reelforge.db")
}
