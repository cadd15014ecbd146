//! Tracing subscriber setup
//!
//! Installed once per process. `RUST_LOG` always wins over the configured
//! level. Interactive sessions keep stderr to warnings unless `--verbose`.

use anyhow::{Context, Result};
use parley_core::config::ChatConfig;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("parley_core={level},parleyctl={level},warn"))
    })
}

/// Level used when logging to stderr.
pub fn stderr_level(config: &ChatConfig, verbose: bool) -> String {
    if verbose {
        config.logging.level.clone()
    } else {
        "warn".to_string()
    }
}

pub fn init(config: &ChatConfig, verbose: bool) -> Result<()> {
    if config.logging.log_to_file {
        let path = config.log_file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter_for(&config.logging.level))
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter_for(&stderr_level(config, verbose)))
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;
    }

    tracing::info!("Parley v{} starting", parley_core::VERSION);
    Ok(())
}
