//! Logging initialization.
//!
//! Installs a `tracing` subscriber with:
//! - an `EnvFilter` (`RUST_LOG` wins over the configured level),
//! - a stderr layer with local RFC 3339 timestamps,
//! - an optional daily-rolling file layer behind a non-blocking writer.
//!
//! The returned [`WorkerGuard`] flushes the file writer on drop, so the caller
//! must keep it alive for the lifetime of the process.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default level for navview targets.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors from logging setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid log file path: {0}")]
    InvalidPath(PathBuf),

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// `[logging]` section of the configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// A bare level (`debug`) or a full filter directive (`navview=debug,reqwest=warn`).
    pub level: String,
    /// Log file; rotated daily with the date appended.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Set the level or directive.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Also log to `path`.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }
}

/// Expand a bare level into directives for the navview crates.
pub fn filter_directive(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("navview={level},navview_cli={level}")
    }
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = filter_directive(level);
    EnvFilter::try_new(&directive).map_err(|e| LoggingError::InvalidFilter {
        filter: directive,
        reason: e.to_string(),
    })
}

/// Open a daily-rolling, non-blocking writer for `path`.
pub fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let appender = tracing_appender::rolling::daily(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when a file is configured.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = build_filter(&config.level)?;

    let stderr_layer = fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_timer(LocalTime::rfc_3339())
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(level = %config.level, file = ?config.file, "Logging initialized");
    Ok(guard)
}
