//! Experiment tracking
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              ├──< MetricRecord (N) [one per key]
//!                              └─── ArtifactRecord (0..1) [CAS]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use housing_mlops::experiment::{InMemoryTracker, Tracker};
//!
//! let mut tracker = InMemoryTracker::new();
//! tracker
//!     .with_run("housing", "linear_regression", |run| {
//!         run.log_metric("mae", 0.53)?;
//!         run.log_model(b"{}")?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let runs = tracker.list_runs("housing").unwrap();
//! assert_eq!(runs[0].metric("mae"), Some(0.53));
//! ```

mod artifact_record;
mod experiment_record;
mod file;
mod memory;
mod metric_record;
mod run_record;
mod tracker;

pub use artifact_record::{content_hash, ArtifactRecord};
pub use experiment_record::ExperimentRecord;
pub use file::FileTracker;
pub use memory::InMemoryTracker;
pub use metric_record::MetricRecord;
pub use run_record::{RunRecord, RunStatus};
pub use tracker::{RunScope, Tracker, MODEL_ARTIFACT_KEY};

use crate::{Error, Result};

/// URI selecting the in-memory backend
pub const MEMORY_URI: &str = "memory:";

/// Open the tracker named by a tracking URI.
///
/// - `memory:` selects [`InMemoryTracker`]
/// - `file:<dir>`, `file://<dir>`, or a bare path selects [`FileTracker`]
///
/// # Errors
///
/// Returns `Error::Configuration` for an empty URI or an unsupported scheme,
/// and `Error::Storage` if the file store cannot be created.
pub fn open_tracker(uri: &str) -> Result<Box<dyn Tracker>> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(Error::Configuration("tracking_uri is empty".to_string()));
    }
    if uri == MEMORY_URI {
        return Ok(Box::new(InMemoryTracker::new()));
    }

    let path = match uri.strip_prefix("file://").or_else(|| uri.strip_prefix("file:")) {
        Some(path) => path,
        None if uri.contains("://") => {
            return Err(Error::Configuration(format!(
                "unsupported tracking_uri '{uri}': expected file:<dir>, a path, or {MEMORY_URI}"
            )));
        }
        None => uri,
    };
    if path.is_empty() {
        return Err(Error::Configuration(format!(
            "tracking_uri '{uri}' names no directory"
        )));
    }
    Ok(Box::new(FileTracker::open(path)?))
}
