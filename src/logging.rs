//! Logging setup for the `tabprep` binary.
//!
//! Logs go to the console and to a daily-rotated file in the platform data
//! directory. The library only emits `tracing` events; installing a
//! subscriber is left to whichever front-end embeds it.
//!
//! ```no_run
//! tabprep::logging::init().expect("Failed to initialize logging");
//! tracing::info!("ready");
//! ```

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Log directory under the platform data dir
/// (e.g. `~/.local/share/tabprep/logs` on Linux).
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    let log_dir = base_dir.join("tabprep").join("logs");

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }

    Ok(log_dir)
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`), a
/// compact stderr layer and a daily `tabprep.<date>.log` file keeping seven
/// days.
///
/// # Errors
///
/// Returns error if the log directory or file appender cannot be created,
/// or a subscriber is already installed.
pub fn init() -> Result<()> {
    let log_dir = get_log_dir()?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(7)
        .filename_prefix("tabprep")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create log file appender")?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    let file_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(file_appender);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!("Logging initialized, log directory: {}", log_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_log_dir() -> Result<()> {
        let log_dir = get_log_dir()?;
        assert!(
            log_dir.ends_with("tabprep/logs") || log_dir.ends_with("tabprep\\logs"),
            "unexpected log dir {}",
            log_dir.display()
        );
        Ok(())
    }
}
