//! Error types for the forecasting pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the forecasting core.
///
/// An unseen categorical key is deliberately absent: it degrades to an
/// all-zero one-hot encoding instead of failing.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Source data could not be read or did not match the record schema
    #[error("Ingestion error in {path:?}: {message}")]
    Ingestion { path: PathBuf, message: String },

    /// Training could not produce a usable model
    #[error("Fit error: {0}")]
    Fit(String),

    /// Fold count outside `2..=rows`
    #[error("Invalid fold count {folds} for {rows} rows")]
    InvalidFoldCount { folds: usize, rows: usize },

    #[error("Model artifact not found: {0:?}")]
    ArtifactNotFound(PathBuf),

    /// Artifact exists but could not be parsed or failed its checksum
    #[error("Model artifact {path:?} is corrupt: {message}")]
    ArtifactCorrupt { path: PathBuf, message: String },

    /// Artifact was trained for a different record schema
    #[error("Schema mismatch: artifact has {found}, expected {expected}")]
    SchemaMismatch { expected: String, found: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type with the forecasting error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl ForecastError {
    pub(crate) fn ingestion(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ForecastError::Ingestion {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ForecastError::ArtifactCorrupt {
            path: path.into(),
            message: message.into(),
        }
    }
}
