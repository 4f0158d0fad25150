use crate::db::DEFAULT_DB_FILE;
use config::{Config as Cfg, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Workspace directory opened at startup, if any.
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    #[serde(default = "default_db_file_name")]
    pub db_file_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_file_name() -> String {
    DEFAULT_DB_FILE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            workspace: None,
            db_file_name: default_db_file_name(),
        }
    }
}

impl Config {
    /// `rollbookd.toml` in the working directory (optional), then `ROLLBOOKD_*` variables.
    pub fn load() -> anyhow::Result<Self> {
        let cfg = Cfg::builder()
            .add_source(File::with_name("rollbookd").required(false))
            .add_source(Environment::with_prefix("ROLLBOOKD"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }
}
