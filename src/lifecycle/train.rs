//! Train every candidate against one split and record a run for each

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use tracing::{info, info_span, warn};

use crate::experiment::{RunScope, RunStatus, Tracker};
use crate::metrics::RegressionMetrics;
use crate::model::{Model, Regressor, TrainedModel};
use crate::split::Split;
use crate::{Error, Result};

/// What happened to one candidate.
#[derive(Debug)]
pub enum TrainingOutcome {
    /// Fitted, evaluated, and recorded with its artifact.
    Trained {
        /// Run holding the metrics and artifact
        run_id: String,
        /// Held-out metrics
        metrics: RegressionMetrics,
    },
    /// Fitting or evaluation failed; the run was closed `Failed`.
    Failed {
        /// Run left for post-mortem inspection
        run_id: String,
        /// Always `Error::Training`
        error: Error,
    },
}

impl TrainingOutcome {
    /// ID of the run recorded for the candidate.
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            Self::Trained { run_id, .. } | Self::Failed { run_id, .. } => run_id,
        }
    }

    /// Held-out metrics, if training succeeded.
    #[must_use]
    pub const fn metrics(&self) -> Option<&RegressionMetrics> {
        match self {
            Self::Trained { metrics, .. } => Some(metrics),
            Self::Failed { .. } => None,
        }
    }
}

/// Result of one [`train_all`] invocation, in candidate order.
#[derive(Debug)]
pub struct TrainingReport {
    experiment_name: String,
    outcomes: Vec<(String, TrainingOutcome)>,
}

impl TrainingReport {
    /// Experiment the runs were recorded under.
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// `(candidate, outcome)` pairs in the order trained.
    #[must_use]
    pub fn outcomes(&self) -> &[(String, TrainingOutcome)] {
        &self.outcomes
    }

    /// Outcome for one candidate.
    #[must_use]
    pub fn outcome(&self, candidate: &str) -> Option<&TrainingOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == candidate)
            .map(|(_, outcome)| outcome)
    }

    /// Candidates whose training failed.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes.iter().filter_map(|(name, outcome)| match outcome {
            TrainingOutcome::Failed { error, .. } => Some((name.as_str(), error)),
            TrainingOutcome::Trained { .. } => None,
        })
    }

    /// Number of candidates that trained successfully.
    #[must_use]
    pub fn trained_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, TrainingOutcome::Trained { .. }))
            .count()
    }
}

/// Inputs shared by every candidate.
struct Prepared {
    feature_names: Vec<String>,
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_test: Array2<f64>,
    y_test: Vec<f64>,
}

impl Prepared {
    fn from_split(split: &Split) -> Result<Self> {
        let target = split.target_name();
        Ok(Self {
            feature_names: split.feature_names(),
            x_train: split.train_features.to_matrix(),
            y_train: Array1::from(split.train_target.column(&target)?.to_vec()),
            x_test: split.test_features.to_matrix(),
            y_test: split.test_target.column(&target)?.to_vec(),
        })
    }
}

/// Fit, score, and package one candidate. Every error is a training error
/// tagged with the candidate name.
fn fit_and_evaluate(
    name: &str,
    mut model: Model,
    data: &Prepared,
) -> Result<(RegressionMetrics, Vec<u8>)> {
    let tag = |e: Error| Error::training(name, &e);

    model.fit(&data.x_train, &data.y_train).map_err(tag)?;
    let predictions = model.predict(&data.x_test).map_err(tag)?;
    let metrics = RegressionMetrics::evaluate(&data.y_test, &predictions.to_vec()).map_err(tag)?;
    let artifact = TrainedModel::new(name, data.feature_names.clone(), model)
        .and_then(|trained| trained.to_bytes())
        .map_err(tag)?;
    Ok((metrics, artifact))
}

/// Train each candidate on the split's training partition, evaluate it on
/// the test partition, and record one closed run per candidate.
///
/// Candidates run one at a time in name order. A candidate that fails to fit
/// or evaluate is recorded as a `Failed` run and reported, and the remaining
/// candidates still train. Repeated invocations add new runs; nothing is
/// deduplicated.
///
/// # Errors
///
/// Returns tracker errors (which abort the whole invocation) and
/// `Error::Data` if the split's target column cannot be read.
pub fn train_all<T: Tracker + ?Sized>(
    tracker: &mut T,
    candidates: BTreeMap<String, Model>,
    split: &Split,
    experiment_name: &str,
) -> Result<TrainingReport> {
    let data = Prepared::from_split(split)?;
    if candidates.is_empty() {
        warn!(experiment = experiment_name, "no candidates to train");
    }

    let mut outcomes = Vec::with_capacity(candidates.len());
    for (name, model) in candidates {
        let span = info_span!("train", candidate = %name);
        let _enter = span.enter();

        let mut scope = RunScope::begin(&mut *tracker, experiment_name, &name)?;
        let run_id = scope.run_id().to_string();

        let outcome = match fit_and_evaluate(&name, model, &data) {
            Ok((metrics, artifact)) => {
                for (key, value) in metrics.named() {
                    scope.log_metric(key, value)?;
                }
                scope.log_model(&artifact)?;
                scope.finish(RunStatus::Success)?;
                info!(
                    run_id = %run_id,
                    mae = metrics.mae,
                    rmse = metrics.rmse,
                    r2 = metrics.r2,
                    "candidate trained"
                );
                TrainingOutcome::Trained { run_id, metrics }
            }
            Err(error) => {
                scope.finish(RunStatus::Failed)?;
                warn!(run_id = %run_id, %error, "candidate failed");
                TrainingOutcome::Failed { run_id, error }
            }
        };
        outcomes.push((name, outcome));
    }

    Ok(TrainingReport {
        experiment_name: experiment_name.to_string(),
        outcomes,
    })
}
