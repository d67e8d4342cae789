//! Run Record - one training attempt under an experiment

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ArtifactRecord, MetricRecord};
use crate::{Error, Result};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is open and accepting metrics and an artifact.
    Running,
    /// Run completed successfully.
    Success,
    /// Run failed; whatever was logged before the failure is kept.
    Failed,
}

impl RunStatus {
    /// Whether the run has been finalized.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Run Record represents a single execution under an experiment.
///
/// A run is created `Running`, accumulates metrics (one value per key) and
/// at most one artifact, and is then closed exactly once. Closed runs are
/// immutable: every mutator returns `Error::State`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    run_name: String,
    status: RunStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    metrics: BTreeMap<String, MetricRecord>,
    artifact: Option<ArtifactRecord>,
}

impl RunRecord {
    /// Create a new run record in Running status.
    ///
    /// # Arguments
    ///
    /// * `run_id` - Unique identifier for the run
    /// * `experiment_id` - ID of the parent experiment
    /// * `run_name` - Human-readable name (the candidate model name)
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
        run_name: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            run_name: run_name.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            metrics: BTreeMap::new(),
            artifact: None,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the run name.
    #[must_use]
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Whether the run has been finalized.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    /// Get the start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Get the end timestamp, if the run has been closed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// All logged metrics by key.
    #[must_use]
    pub const fn metrics(&self) -> &BTreeMap<String, MetricRecord> {
        &self.metrics
    }

    /// Value of a single metric.
    #[must_use]
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).map(MetricRecord::value)
    }

    /// The run's artifact, if one was logged.
    #[must_use]
    pub const fn artifact(&self) -> Option<&ArtifactRecord> {
        self.artifact.as_ref()
    }

    /// Record a metric, replacing any earlier value for the same key.
    ///
    /// # Errors
    ///
    /// Returns `Error::State` if the run is closed.
    pub fn record_metric(&mut self, metric: MetricRecord) -> Result<()> {
        self.ensure_open("log a metric to")?;
        self.metrics.insert(metric.key().to_string(), metric);
        Ok(())
    }

    /// Attach the run's single artifact.
    ///
    /// # Errors
    ///
    /// Returns `Error::State` if the run is closed or already has an artifact.
    pub fn attach_artifact(&mut self, artifact: ArtifactRecord) -> Result<()> {
        self.ensure_open("log an artifact to")?;
        if let Some(existing) = &self.artifact {
            return Err(Error::State(format!(
                "run '{}' already has artifact '{}'",
                self.run_id,
                existing.key()
            )));
        }
        self.artifact = Some(artifact);
        Ok(())
    }

    /// Close the run with a final status.
    ///
    /// # Errors
    ///
    /// Returns `Error::State` if the run is already closed or `status` is
    /// `Running`.
    pub fn complete(&mut self, status: RunStatus) -> Result<()> {
        self.ensure_open("complete")?;
        if !status.is_closed() {
            return Err(Error::State(format!(
                "run '{}' cannot be completed as Running",
                self.run_id
            )));
        }
        self.status = status;
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    fn ensure_open(&self, action: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::State(format!(
                "cannot {action} run '{}': already closed as {:?}",
                self.run_id, self.status
            )));
        }
        Ok(())
    }
}
