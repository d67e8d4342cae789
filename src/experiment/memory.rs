//! In-memory tracker for tests and throwaway sessions (`memory:` URI)

use std::collections::{BTreeMap, HashMap};

use tracing::info;

use super::tracker::new_id;
use super::{ArtifactRecord, ExperimentRecord, MetricRecord, RunRecord, RunStatus, Tracker};
use crate::{Error, Result};

/// In-memory store for experiment tracking data.
///
/// Experiments are indexed by name, runs by ID, and artifact blobs by
/// content hash. Nothing outlives the process.
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    experiments: BTreeMap<String, ExperimentRecord>,
    runs: HashMap<String, RunRecord>,
    blobs: HashMap<String, Vec<u8>>,
}

impl InMemoryTracker {
    /// Create a new empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the tracker holds no experiments, runs, or artifacts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.runs.is_empty() && self.blobs.is_empty()
    }

    /// Number of experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Number of runs, open or closed.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Number of distinct artifact blobs.
    #[must_use]
    pub fn artifact_count(&self) -> usize {
        self.blobs.len()
    }

    /// Get a run by ID regardless of status.
    #[must_use]
    pub fn get_run(&self, run_id: &str) -> Option<&RunRecord> {
        self.runs.get(run_id)
    }

    fn run_mut(&mut self, run_id: &str) -> Result<&mut RunRecord> {
        self.runs
            .get_mut(run_id)
            .ok_or_else(|| Error::NotFound(format!("run '{run_id}'")))
    }
}

impl Tracker for InMemoryTracker {
    fn get_or_create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        if let Some(existing) = self.experiments.get(name) {
            return Ok(existing.clone());
        }
        let experiment = ExperimentRecord::new(new_id(), name);
        info!(experiment = name, id = experiment.experiment_id(), "experiment created");
        self.experiments.insert(name.to_string(), experiment.clone());
        Ok(experiment)
    }

    fn find_experiment(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        Ok(self.experiments.get(name).cloned())
    }

    fn create_run(&mut self, experiment_id: &str, run_name: &str) -> Result<RunRecord> {
        if !self
            .experiments
            .values()
            .any(|e| e.experiment_id() == experiment_id)
        {
            return Err(Error::NotFound(format!("experiment id '{experiment_id}'")));
        }
        let run = RunRecord::new(new_id(), experiment_id, run_name);
        self.runs.insert(run.run_id().to_string(), run.clone());
        Ok(run)
    }

    fn log_metric(&mut self, run_id: &str, key: &str, value: f64) -> Result<()> {
        self.run_mut(run_id)?
            .record_metric(MetricRecord::new(run_id, key, value))
    }

    fn log_artifact(&mut self, run_id: &str, key: &str, bytes: &[u8]) -> Result<ArtifactRecord> {
        let artifact = ArtifactRecord::for_content(run_id, key, bytes);
        self.run_mut(run_id)?.attach_artifact(artifact.clone())?;
        self.blobs
            .entry(artifact.cas_hash().to_string())
            .or_insert_with(|| bytes.to_vec());
        Ok(artifact)
    }

    fn complete_run(&mut self, run_id: &str, status: RunStatus) -> Result<RunRecord> {
        let run = self.run_mut(run_id)?;
        run.complete(status)?;
        Ok(run.clone())
    }

    fn list_runs(&self, experiment_name: &str) -> Result<Vec<RunRecord>> {
        let experiment = self
            .experiments
            .get(experiment_name)
            .ok_or_else(|| Error::NotFound(format!("experiment '{experiment_name}'")))?;

        let mut runs: Vec<RunRecord> = self
            .runs
            .values()
            .filter(|run| run.experiment_id() == experiment.experiment_id() && run.is_closed())
            .cloned()
            .collect();
        runs.sort_by(|a, b| {
            a.started_at()
                .cmp(&b.started_at())
                .then_with(|| a.run_id().cmp(b.run_id()))
        });
        Ok(runs)
    }

    fn load_artifact(&self, artifact: &ArtifactRecord) -> Result<Vec<u8>> {
        let bytes = self.blobs.get(artifact.cas_hash()).ok_or_else(|| {
            Error::Artifact(format!("artifact blob {} is missing", artifact.cas_hash()))
        })?;
        if !artifact.matches(bytes) {
            return Err(Error::Artifact(format!(
                "artifact blob {} does not match its hash",
                artifact.cas_hash()
            )));
        }
        Ok(bytes.clone())
    }
}
