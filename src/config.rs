//! Configuration store
//!
//! A single YAML document is read once at process start, validated, and then
//! handed to every stage by reference. Nothing here is global: the binary
//! owns the `Config` and passes `&Config` down.
//!
//! ```yaml
//! data:
//!   raw_data_path: data/raw
//!   processed_data_path: data/processed
//!   dataset:
//!     test_size: 0.2
//!     random_state: 42
//! mlflow:
//!   tracking_uri: file:./mlruns
//!   experiment_name: housing-price-prediction
//! model:
//!   linear_regression: {}
//!   random_forest:
//!     n_estimators: 100
//!     random_state: 42
//! ```

use crate::model::Model;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the configuration document.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// File name of the raw dataset inside `raw_data_path`.
pub const RAW_DATA_FILE: &str = "california_housing.csv";

/// Target column of the housing dataset.
pub const DEFAULT_TARGET_COLUMN: &str = "MedHouseVal";

/// Immutable, validated pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Data locations and split parameters
    pub data: DataConfig,
    /// Experiment tracker location
    #[serde(rename = "mlflow", alias = "tracking")]
    pub tracking: TrackingConfig,
    /// Candidate models keyed by name, each with its hyper-parameters
    pub model: BTreeMap<String, HyperParameters>,
}

/// `data:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Directory holding the raw dataset
    pub raw_data_path: PathBuf,
    /// Directory holding the four split tables
    pub processed_data_path: PathBuf,
    /// Split and source parameters
    pub dataset: DatasetConfig,
}

/// `data.dataset:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Fraction of rows held out for evaluation, in `(0, 1)`
    pub test_size: f64,
    /// Seed of the split permutation; any integer
    pub random_state: i64,
    /// Column predicted by the models
    #[serde(default = "default_target_column")]
    pub target_column: String,
    /// Optional HTTP location of the raw CSV
    #[serde(default)]
    pub source_url: Option<String>,
}

fn default_target_column() -> String {
    DEFAULT_TARGET_COLUMN.to_string()
}

/// `mlflow:` (or `tracking:`) section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingConfig {
    /// Tracker location, `file:<dir>`, a bare directory, or `memory:`
    pub tracking_uri: String,
    /// Experiment that collects every training invocation
    pub experiment_name: String,
}

/// Free-form hyper-parameters of one candidate model.
///
/// Values stay untyped until the model is constructed so that a wrong type
/// is reported against the exact model and key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperParameters(BTreeMap<String, serde_json::Value>);

impl HyperParameters {
    /// Empty parameter set (all defaults).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and programmatic candidates.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Parameter names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Raw value of a parameter; explicit `null` reads as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Non-negative integer parameter.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the value is not a non-negative integer.
    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        self.get(key)
            .map(|v| {
                v.as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| type_error(key, "a non-negative integer", v))
            })
            .transpose()
    }

    /// Seed parameter, any integer.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the value is not an integer in `i64` range.
    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.get(key)
            .map(|v| v.as_i64().ok_or_else(|| type_error(key, "an integer", v)))
            .transpose()
    }

    /// Boolean parameter.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the value is not a boolean.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get(key)
            .map(|v| v.as_bool().ok_or_else(|| type_error(key, "a boolean", v)))
            .transpose()
    }
}

fn type_error(key: &str, expected: &str, value: &serde_json::Value) -> Error {
    Error::Configuration(format!(
        "hyper-parameter '{key}' must be {expected}, got {value}"
    ))
}

impl Config {
    /// Load and validate the configuration document at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the file is missing, unparsable, or
    /// fails validation. All three are fatal at startup.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Parse and validate a configuration document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` on malformed YAML or invalid values.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Configuration(format!("failed to parse YAML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every recognised option.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` describing the first invalid option.
    pub fn validate(&self) -> Result<()> {
        validate_test_size(self.data.dataset.test_size)?;

        if self.data.dataset.target_column.trim().is_empty() {
            return Err(Error::Configuration(
                "data.dataset.target_column must not be empty".to_string(),
            ));
        }
        if self.tracking.tracking_uri.trim().is_empty() {
            return Err(Error::Configuration(
                "mlflow.tracking_uri must not be empty".to_string(),
            ));
        }
        if self.tracking.experiment_name.trim().is_empty() {
            return Err(Error::Configuration(
                "mlflow.experiment_name must not be empty".to_string(),
            ));
        }
        if self.model.is_empty() {
            return Err(Error::Configuration(
                "model section must name at least one candidate".to_string(),
            ));
        }

        // Constructing each candidate checks names and hyper-parameter types
        for (name, params) in &self.model {
            Model::from_config(name, params)?;
        }

        Ok(())
    }

    /// Full path of the raw dataset file.
    #[must_use]
    pub fn raw_data_file(&self) -> PathBuf {
        self.data.raw_data_path.join(RAW_DATA_FILE)
    }

    /// Untrained candidates in stable (name) order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for unknown models or bad hyper-parameters.
    pub fn candidates(&self) -> Result<BTreeMap<String, Model>> {
        self.model
            .iter()
            .map(|(name, params)| Ok((name.clone(), Model::from_config(name, params)?)))
            .collect()
    }
}

/// Reject split fractions outside the open interval `(0, 1)`.
///
/// # Errors
///
/// Returns `Error::Configuration` for out-of-range or non-finite fractions.
pub fn validate_test_size(test_size: f64) -> Result<()> {
    if test_size.is_finite() && test_size > 0.0 && test_size < 1.0 {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "test_size must be in (0, 1), got {test_size}"
        )))
    }
}
