//! Tracker contract and the scoped run handle

use tracing::{debug, warn};
use uuid::Uuid;

use super::{ArtifactRecord, ExperimentRecord, RunRecord, RunStatus};
use crate::Result;

/// Key under which [`RunScope::log_model`] stores the model artifact
pub const MODEL_ARTIFACT_KEY: &str = "model";

/// Fresh identifier for experiments and runs (UUIDv4, simple form).
pub(crate) fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Backend for experiment tracking.
///
/// Implementations persist experiments, runs, metrics, and artifacts. The
/// lifecycle rules (one value per metric key, at most one artifact per run,
/// closed runs are immutable) are enforced by [`RunRecord`], so every backend
/// applies them identically.
///
/// At most one writer process is assumed per backing store.
pub trait Tracker {
    /// Look up an experiment by name, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the backend cannot be read or written.
    fn get_or_create_experiment(&mut self, name: &str) -> Result<ExperimentRecord>;

    /// Look up an experiment by name.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the backend cannot be read.
    fn find_experiment(&self, name: &str) -> Result<Option<ExperimentRecord>>;

    /// Open a new run under an existing experiment.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown experiment id.
    fn create_run(&mut self, experiment_id: &str, run_name: &str) -> Result<RunRecord>;

    /// Record a metric on an open run; re-logging a key overwrites it.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown run and `Error::State` if the
    /// run is closed.
    fn log_metric(&mut self, run_id: &str, key: &str, value: f64) -> Result<()>;

    /// Store the run's single artifact.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown run and `Error::State` if the
    /// run is closed or already has an artifact.
    fn log_artifact(&mut self, run_id: &str, key: &str, bytes: &[u8]) -> Result<ArtifactRecord>;

    /// Close a run with a final status.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown run and `Error::State` if the
    /// run is already closed.
    fn complete_run(&mut self, run_id: &str, status: RunStatus) -> Result<RunRecord>;

    /// All closed runs under the named experiment, open runs excluded.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the experiment does not exist.
    fn list_runs(&self, experiment_name: &str) -> Result<Vec<RunRecord>>;

    /// Fetch and verify an artifact's bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Artifact` if the blob is missing or its content no
    /// longer matches the recorded hash.
    fn load_artifact(&self, artifact: &ArtifactRecord) -> Result<Vec<u8>>;

    /// Open a run scope under `experiment_name` (created if absent).
    ///
    /// # Errors
    ///
    /// Propagates backend errors from creating the experiment or run.
    fn begin_run(&mut self, experiment_name: &str, run_name: &str) -> Result<RunScope<'_, Self>>
    where
        Self: Sized,
    {
        RunScope::begin(self, experiment_name, run_name)
    }

    /// Run `f` inside a run scope, closing it `Success` on `Ok` and `Failed`
    /// on `Err`.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a backend error from opening or
    /// closing the run.
    fn with_run<'s, R, F>(&'s mut self, experiment_name: &str, run_name: &str, f: F) -> Result<R>
    where
        Self: Sized,
        F: FnOnce(&mut RunScope<'s, Self>) -> Result<R>,
    {
        RunScope::run(self, experiment_name, run_name, f)
    }
}

/// An open run, finalized on every exit path.
///
/// Consume it with [`RunScope::finish`]; a scope dropped while still open
/// (early return, `?`, panic unwinding) closes its run as `Failed`.
pub struct RunScope<'a, T: Tracker + ?Sized> {
    tracker: &'a mut T,
    run_id: String,
    run_name: String,
    open: bool,
}

impl<'a, T: Tracker + ?Sized> RunScope<'a, T> {
    /// Create (or reuse) the experiment and open a run in it.
    ///
    /// # Errors
    ///
    /// Propagates backend errors from creating the experiment or run.
    pub fn begin(tracker: &'a mut T, experiment_name: &str, run_name: &str) -> Result<Self> {
        let experiment = tracker.get_or_create_experiment(experiment_name)?;
        let run = tracker.create_run(experiment.experiment_id(), run_name)?;
        debug!(
            experiment = experiment_name,
            run_id = run.run_id(),
            run_name,
            "run opened"
        );

        Ok(Self {
            tracker,
            run_id: run.run_id().to_string(),
            run_name: run_name.to_string(),
            open: true,
        })
    }

    /// Scoped form of [`RunScope::begin`]: runs `f`, then closes the run
    /// `Success` or `Failed` according to its result.
    ///
    /// # Errors
    ///
    /// Returns the closure's error unless closing the run fails, in which
    /// case the backend error wins.
    pub fn run<R, F>(tracker: &'a mut T, experiment_name: &str, run_name: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Self) -> Result<R>,
    {
        let mut scope = Self::begin(tracker, experiment_name, run_name)?;
        match f(&mut scope) {
            Ok(value) => {
                scope.finish(RunStatus::Success)?;
                Ok(value)
            }
            Err(err) => {
                scope.finish(RunStatus::Failed)?;
                Err(err)
            }
        }
    }

    /// ID of the open run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Name of the open run.
    #[must_use]
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Record a metric on this run.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        self.tracker.log_metric(&self.run_id, key, value)
    }

    /// Store the serialized model as this run's artifact.
    ///
    /// # Errors
    ///
    /// Returns `Error::State` on a second call for the same run.
    pub fn log_model(&mut self, bytes: &[u8]) -> Result<ArtifactRecord> {
        self.tracker
            .log_artifact(&self.run_id, MODEL_ARTIFACT_KEY, bytes)
    }

    /// Close the run with `status`.
    ///
    /// # Errors
    ///
    /// Propagates backend errors; the scope will not retry on drop.
    pub fn finish(mut self, status: RunStatus) -> Result<RunRecord> {
        self.open = false;
        let record = self.tracker.complete_run(&self.run_id, status)?;
        debug!(run_id = %self.run_id, ?status, "run closed");
        Ok(record)
    }
}

impl<T: Tracker + ?Sized> Drop for RunScope<'_, T> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(err) = self.tracker.complete_run(&self.run_id, RunStatus::Failed) {
            warn!(run_id = %self.run_id, error = %err, "failed to close abandoned run");
        }
    }
}

impl<T: Tracker + ?Sized> std::fmt::Debug for RunScope<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunScope")
            .field("run_id", &self.run_id)
            .field("run_name", &self.run_name)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}
