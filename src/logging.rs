/// Subscriber setup. Called once from `main`; everything else logs through `tracing` macros.
use crate::config::LoggingConfig;
use anyhow::{anyhow, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Our crate at `level`, dependencies at `warn`
pub fn filter_directive(level: &str) -> String {
    format!("video_harvester={},warn", level.trim().to_ascii_lowercase())
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level; `verbose` forces debug.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new(filter_directive("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(&config.level)))
    };

    let (file_layer, file_error) = if config.file_enabled {
        match open_log_file(&config.file_path) {
            Ok(file) => (
                Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
                None,
            ),
            Err(e) => (None, Some(e)),
        }
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    if let Some(e) = file_error {
        tracing::warn!(
            "⚠️ Cannot open log file {}: {}, logging to console only",
            config.file_path.display(),
            e
        );
    }
    Ok(())
}
