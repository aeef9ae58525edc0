//! CLI error type.

use std::path::PathBuf;

use navview::error::{ImageError, ViewError};
use navview::logging::LoggingError;
use navview::ConfigError;
use thiserror::Error;

/// Errors surfaced to the user by the `navview` binary.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("Failed to read replay script {path}: {source}")]
    ScriptRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid replay script {path}: {source}")]
    ScriptParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("View error: {0}")]
    View(#[from] ViewError),

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}
