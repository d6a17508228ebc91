use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Intervals below this many seconds are allowed but logged as a warning.
pub const SHORT_INTERVAL_SECS: u64 = 2;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub interval_secs: u64,
    /// Process name to follow; blank means every tree.
    pub filter: String,
    /// Stop after this many cycles; 0 runs until interrupted.
    pub max_cycles: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            interval_secs: 10,
            filter: String::new(),
            max_cycles: 0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub snapshot_path: PathBuf,
    pub summary_enabled: bool,
    pub summary_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            snapshot_path: PathBuf::from("task_manager_snapshot.txt"),
            summary_enabled: false,
            summary_path: PathBuf::from("system_summary.csv"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub path: PathBuf,
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            path: PathBuf::from("procsnap.log"),
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("interval must be at least 1 second")]
    ZeroInterval,
    #[error("unknown log level {0:?} (expected trace, debug, info, warn or error)")]
    InvalidLevel(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        self.log_level()?;
        Ok(())
    }

    /// The trimmed filter, or `None` when the filter is blank.
    pub fn filter(&self) -> Option<&str> {
        let filter = self.general.filter.trim();
        (!filter.is_empty()).then_some(filter)
    }

    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        self.logging
            .level
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidLevel(self.logging.level.clone()))
    }

    pub fn is_short_interval(&self) -> bool {
        self.general.interval_secs < SHORT_INTERVAL_SECS
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("procsnap").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}
