//! CLI error types.

use std::path::PathBuf;

use quarry_core::model::ConstructionError;
use thiserror::Error;

/// Errors reported by the `quarry` binary.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The file parsed but is not an array of objects.
    #[error("{}: {message}", path.display())]
    InvalidData { path: PathBuf, message: String },

    #[error("invalid argument: {0}")]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Query(#[from] quarry_core::Error),

    /// A rendered expression diagnostic, printed as is.
    #[error("{0}")]
    Diagnostic(String),
}
