//! Pick the best recorded run and load its model

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::experiment::{RunRecord, RunStatus, Tracker};
use crate::metrics::R2;
use crate::model::TrainedModel;
use crate::{Error, Result};

/// Which extreme of the metric is best.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Lower is better (error metrics)
    Minimize,
    /// Higher is better (score metrics)
    Maximize,
}

impl Direction {
    /// Natural direction for a metric: maximize `r2`, minimize the rest.
    #[must_use]
    pub fn for_metric(metric: &str) -> Self {
        if metric == R2 {
            Self::Maximize
        } else {
            Self::Minimize
        }
    }

    /// Order so that the better value sorts first.
    fn compare(self, a: f64, b: f64) -> Ordering {
        match self {
            Self::Minimize => a.total_cmp(&b),
            Self::Maximize => b.total_cmp(&a),
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "min" | "minimize" => Ok(Self::Minimize),
            "max" | "maximize" => Ok(Self::Maximize),
            other => Err(Error::Configuration(format!(
                "direction must be 'min' or 'max', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Minimize => "min",
            Self::Maximize => "max",
        })
    }
}

/// The winning run of [`select_best`] and its deserialized model.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    /// Winning run
    pub run_id: String,
    /// Candidate name of the winning run
    pub run_name: String,
    /// Metric the selection ranked by
    pub metric: String,
    /// Winning metric value
    pub value: f64,
    /// Predictor with its feature schema
    pub model: TrainedModel,
}

/// Select the run with the extremal `metric` under `experiment_name` and
/// load its artifact.
///
/// A run is eligible if it closed `Success`, recorded a finite value for
/// `metric`, and holds an artifact. Exact ties go to the smallest run ID, so
/// repeated calls over the same runs always pick the same one.
///
/// # Errors
///
/// Returns `Error::NotFound` if the experiment does not exist or has no
/// eligible run, and `Error::Artifact` if the winner's artifact cannot be
/// loaded or decoded.
pub fn select_best<T: Tracker + ?Sized>(
    tracker: &T,
    experiment_name: &str,
    metric: &str,
    direction: Direction,
) -> Result<LoadedModel> {
    let runs = tracker.list_runs(experiment_name)?;
    if runs.is_empty() {
        return Err(Error::NotFound(format!(
            "experiment '{experiment_name}' has no runs"
        )));
    }

    let best = runs
        .iter()
        .filter_map(|run| eligible_value(run, metric).map(|value| (run, value)))
        .min_by(|(a, va), (b, vb)| {
            direction
                .compare(*va, *vb)
                .then_with(|| a.run_id().cmp(b.run_id()))
        });
    let Some((run, value)) = best else {
        return Err(Error::NotFound(format!(
            "no successful run with metric '{metric}' and a model in experiment '{experiment_name}' ({} runs)",
            runs.len()
        )));
    };

    let artifact = run
        .artifact()
        .ok_or_else(|| Error::Artifact(format!("run '{}' has no artifact", run.run_id())))?;
    let bytes = tracker.load_artifact(artifact)?;
    let model = TrainedModel::from_bytes(&bytes)?;

    info!(
        run_id = run.run_id(),
        run_name = run.run_name(),
        metric,
        value,
        %direction,
        "best model loaded"
    );
    Ok(LoadedModel {
        run_id: run.run_id().to_string(),
        run_name: run.run_name().to_string(),
        metric: metric.to_string(),
        value,
        model,
    })
}

fn eligible_value(run: &RunRecord, metric: &str) -> Option<f64> {
    if run.status() != RunStatus::Success || run.artifact().is_none() {
        return None;
    }
    run.metric(metric).filter(|v| v.is_finite())
}
