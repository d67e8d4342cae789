//! Error types for housing-mlops
//!
//! Every stage surfaces its failures to the immediate caller. Nothing in the
//! crate retries: the only fault sources are local disk, the tracker store,
//! and the dataset download, none of which fail transiently in a way worth
//! masking.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration, invalid split fraction
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing expected column, shape mismatch between features and target
    #[error("Data error: {0}")]
    Data(String),

    /// A candidate predictor failed to fit or evaluate
    #[error("Training failed for candidate '{candidate}': {message}")]
    Training {
        /// Candidate (and run) name
        candidate: String,
        /// Underlying failure
        message: String,
    },

    /// Selection requested on a missing or empty experiment
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialized model could not be decoded or verified
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Inference input does not match the training feature schema
    #[error("Schema mismatch: {0}")]
    Schema(String),

    /// Illegal run lifecycle transition (e.g. logging to a closed run)
    #[error("Invalid run state: {0}")]
    State(String),

    /// Tracker persistence failure
    #[error("Tracker storage error: {0}")]
    Storage(String),

    /// Dataset download failure
    #[error("Dataset fetch failed: {0}")]
    Fetch(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap any error as a per-candidate training failure.
    #[must_use]
    pub fn training(candidate: impl Into<String>, source: &impl std::fmt::Display) -> Self {
        Self::Training {
            candidate: candidate.into(),
            message: source.to_string(),
        }
    }
}
