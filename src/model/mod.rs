//! Trainable regressors and the serialized model artifact
//!
//! Two predictors are available as candidates:
//!
//! - [`LinearRegression`]: ordinary least squares with intercept
//! - [`RandomForestRegressor`]: bagged CART regression trees
//!
//! Both are wrapped in the [`Model`] enum so that candidates can be built from
//! configuration, trained through one interface, and serialized into a single
//! self-describing artifact ([`TrainedModel`]).

mod forest;
mod linear;
mod tree;

pub use forest::{MaxFeatures, RandomForestRegressor};
pub use linear::LinearRegression;
pub use tree::RegressionTree;

use crate::config::HyperParameters;
use crate::{Error, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Configuration name of the linear candidate
pub const LINEAR_REGRESSION: &str = "linear_regression";
/// Configuration name of the forest candidate
pub const RANDOM_FOREST: &str = "random_forest";

/// Version written into every artifact; decoding rejects anything else
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// A predictor that can be fitted on a feature matrix and a target vector.
pub trait Regressor {
    /// Fit on `x` (`rows x features`) and `y` (`rows`).
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` on empty, mismatched, or non-finite input.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict one value per row of `x`.
    ///
    /// # Errors
    ///
    /// Returns `Error::State` if unfitted and `Error::Schema` if the column
    /// count differs from the one seen at fit time.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Number of features seen at fit time, `None` before fitting.
    fn n_features(&self) -> Option<usize>;

    /// Whether `fit` has completed successfully.
    fn is_fitted(&self) -> bool {
        self.n_features().is_some()
    }
}

/// Shared input validation for every `fit`.
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(Error::Data(format!(
            "cannot fit on an empty {}x{} feature matrix",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.nrows() != y.len() {
        return Err(Error::Data(format!(
            "feature matrix has {} rows but target has {}",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(Error::Data(
            "training data contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Shared input validation for every `predict`.
pub(crate) fn check_predict_input(expected: Option<usize>, x: &Array2<f64>) -> Result<()> {
    let expected = expected.ok_or_else(|| Error::State("model is not fitted".to_string()))?;
    if x.ncols() != expected {
        return Err(Error::Schema(format!(
            "model expects {expected} features, got {}",
            x.ncols()
        )));
    }
    Ok(())
}

/// Any candidate predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    /// Ordinary least squares
    LinearRegression(LinearRegression),
    /// Bagged regression trees
    RandomForest(RandomForestRegressor),
}

impl Model {
    /// Build an untrained candidate from its configuration entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for unknown model names, unknown
    /// hyper-parameters, or values of the wrong type or range.
    pub fn from_config(name: &str, params: &HyperParameters) -> Result<Self> {
        match name {
            LINEAR_REGRESSION => {
                reject_unknown(name, params, &["fit_intercept"])?;
                let mut model = LinearRegression::new();
                if let Some(fit_intercept) = params.get_bool("fit_intercept")? {
                    model = model.with_fit_intercept(fit_intercept);
                }
                Ok(Self::LinearRegression(model))
            }
            RANDOM_FOREST => {
                reject_unknown(
                    name,
                    params,
                    &[
                        "n_estimators",
                        "max_depth",
                        "min_samples_split",
                        "min_samples_leaf",
                        "max_features",
                        "bootstrap",
                        "random_state",
                    ],
                )?;
                Ok(Self::RandomForest(RandomForestRegressor::from_params(params)?))
            }
            other => Err(Error::Configuration(format!(
                "unknown model '{other}' (expected {LINEAR_REGRESSION} or {RANDOM_FOREST})"
            ))),
        }
    }

    /// Short name of the algorithm.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::LinearRegression(_) => LINEAR_REGRESSION,
            Self::RandomForest(_) => RANDOM_FOREST,
        }
    }
}

fn reject_unknown(model: &str, params: &HyperParameters, allowed: &[&str]) -> Result<()> {
    match params.keys().find(|key| !allowed.contains(key)) {
        Some(key) => Err(Error::Configuration(format!(
            "unknown hyper-parameter '{key}' for {model}"
        ))),
        None => Ok(()),
    }
}

impl Regressor for Model {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Self::LinearRegression(m) => m.fit(x, y),
            Self::RandomForest(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Self::LinearRegression(m) => m.predict(x),
            Self::RandomForest(m) => m.predict(x),
        }
    }

    fn n_features(&self) -> Option<usize> {
        match self {
            Self::LinearRegression(m) => m.n_features(),
            Self::RandomForest(m) => m.n_features(),
        }
    }
}

/// A fitted model together with the feature schema it was trained on.
///
/// This is the artifact stored with each run: JSON bytes that carry the
/// format version, the candidate name, the ordered feature names, and the
/// fitted parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    format_version: u32,
    model_name: String,
    feature_names: Vec<String>,
    model: Model,
}

impl TrainedModel {
    /// Package a fitted model with its feature schema.
    ///
    /// # Errors
    ///
    /// Returns `Error::State` if the model is unfitted and `Error::Schema` if
    /// the feature names do not match the fitted feature count.
    pub fn new(
        model_name: impl Into<String>,
        feature_names: Vec<String>,
        model: Model,
    ) -> Result<Self> {
        let n_features = model
            .n_features()
            .ok_or_else(|| Error::State("cannot package an unfitted model".to_string()))?;
        if n_features != feature_names.len() {
            return Err(Error::Schema(format!(
                "model was fitted on {n_features} features but {} names were given",
                feature_names.len()
            )));
        }
        Ok(Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_name: model_name.into(),
            feature_names,
            model,
        })
    }

    /// Candidate name the model was trained under.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Ordered feature schema.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Fitted predictor.
    #[must_use]
    pub const fn model(&self) -> &Model {
        &self.model
    }

    /// Predict for rows already laid out in schema order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Schema` if the column count is wrong.
    pub fn predict_matrix(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model.predict(x)
    }

    /// Serialize to artifact bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Artifact` if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Artifact(format!("failed to encode model: {e}")))
    }

    /// Decode and verify artifact bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Artifact` on malformed bytes, an unknown format
    /// version, or an inconsistent schema.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let decoded: Self = serde_json::from_slice(bytes)
            .map_err(|e| Error::Artifact(format!("failed to decode model: {e}")))?;

        if decoded.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::Artifact(format!(
                "unsupported artifact format version {} (expected {ARTIFACT_FORMAT_VERSION})",
                decoded.format_version
            )));
        }
        match decoded.model.n_features() {
            Some(n) if n == decoded.feature_names.len() && n > 0 => Ok(decoded),
            Some(n) => Err(Error::Artifact(format!(
                "artifact schema lists {} features but the model has {n}",
                decoded.feature_names.len()
            ))),
            None => Err(Error::Artifact("artifact holds an unfitted model".to_string())),
        }
    }
}
