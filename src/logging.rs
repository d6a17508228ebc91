use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use color_eyre::eyre::{Result, WrapErr, eyre};

use crate::config::{LogFormat, LoggingConfig};

/// Installs the global subscriber writing to the operational log file.
pub fn init_logging(config: &LoggingConfig, level: tracing::Level) -> Result<()> {
    ensure_parent_dir(&config.path)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.path)
        .wrap_err_with(|| format!("Failed to open log file: {}", config.path.display()))?;

    let builder = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(level)
        .with_target(false)
        .with_writer(Mutex::new(file));

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| eyre!("failed to set tracing subscriber: {e}"))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}
