//! Telemetry and Observability
//!
//! Handles setting up `tracing-subscriber` for structured logging.
//! Logging is opt-in: without `--log-level` or `--log-file` nothing is
//! installed unless `RUST_LOG` is set, keeping the interactive prompt clean.
//!
//! Stderr output is pretty-printed in debug builds and JSON in release
//! builds. File output is always JSON.

use sdk::errors::EngineError;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where log output ended up after initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// No subscriber installed
    Disabled,
    Stderr,
    File(PathBuf),
}

/// Map a level name to a tracing level.
///
/// Accepts the names users know from other CLIs, case-insensitively:
/// `TRACE`, `DEBUG`, `INFO`, `WARNING`/`WARN`, `ERROR`, `CRITICAL`/`FATAL`.
pub fn parse_level(name: &str) -> Result<Level, EngineError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "NOTSET" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARNING" | "WARN" => Ok(Level::WARN),
        "ERROR" | "CRITICAL" | "FATAL" => Ok(Level::ERROR),
        other => Err(EngineError::Config(format!(
            "Invalid log level: {}. Expected one of DEBUG, INFO, WARNING, ERROR, CRITICAL",
            other
        ))),
    }
}

/// Initialize logging from the `--log-level` / `--log-file` flags.
///
/// A log file without a level implies `INFO`. If the file cannot be opened a
/// warning is printed and output falls back to stderr. An unknown level is a
/// configuration error.
pub fn init_telemetry(
    log_level: Option<&str>,
    log_file: Option<&Path>,
) -> Result<LogDestination, EngineError> {
    if log_level.is_none() && log_file.is_none() {
        return Ok(init_from_env());
    }

    let level_name = log_level.unwrap_or("INFO");
    let level = parse_level(level_name)?;
    let filter = EnvFilter::new(level.as_str().to_ascii_lowercase());

    if let Some(path) = log_file {
        match open_log_file(path) {
            Ok(file) => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        fmt::layer()
                            .json()
                            .with_ansi(false)
                            .with_writer(Mutex::new(file)),
                    )
                    .try_init()
                    .ok();
                return Ok(LogDestination::File(absolute_path(path)));
            }
            Err(e) => {
                eprintln!("Warning: Failed to create log file {}: {}", path.display(), e);
                eprintln!("Falling back to stderr logging");
            }
        }
    }

    init_stderr(filter);
    Ok(LogDestination::Stderr)
}

/// Emit the startup lines once logging is configured
pub fn log_startup(log_level: Option<&str>, destination: &LogDestination) {
    let level = log_level.unwrap_or("INFO").to_ascii_uppercase();
    match destination {
        LogDestination::Disabled => {}
        LogDestination::Stderr => {
            tracing::info!("Strands CLI started with log level {}", level);
            tracing::info!("Logging to stderr");
        }
        LogDestination::File(path) => {
            tracing::info!("Strands CLI started with log level {}", level);
            tracing::info!("Log file: {}", path.display());
        }
    }
}

fn init_from_env() -> LogDestination {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            init_stderr(filter);
            LogDestination::Stderr
        }
        Err(_) => LogDestination::Disabled,
    }
}

fn init_stderr(filter: EnvFilter) {
    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn open_log_file(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
