//! Random forest regressor
//!
//! Trees are grown one after another on bootstrap samples. Tree `i` draws
//! its randomness from `ChaCha8Rng::seed_from_u64(random_state as u64 + i)`, so a
//! fixed `random_state` reproduces the same forest on every platform.

use super::tree::{RegressionTree, TreeParams};
use super::{check_fit_input, check_predict_input, Regressor};
use crate::config::HyperParameters;
use crate::{Error, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Seed used when the configuration gives none
const DEFAULT_RANDOM_STATE: i64 = 42;

/// Features examined at each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Every feature
    All,
    /// `ceil(sqrt(n_features))`
    Sqrt,
    /// `ceil(log2(n_features))`
    Log2,
    /// `ceil(fraction * n_features)`, fraction in `(0, 1]`
    Fraction(f64),
}

impl MaxFeatures {
    /// Parse a configuration value: `"all"`, `"sqrt"`, `"log2"`, or a
    /// fraction in `(0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for anything else.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(s) => match s.as_str() {
                "all" => Ok(Self::All),
                "sqrt" => Ok(Self::Sqrt),
                "log2" => Ok(Self::Log2),
                other => Err(Error::Configuration(format!(
                    "max_features must be all, sqrt, log2, or a fraction, got '{other}'"
                ))),
            },
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) if f > 0.0 && f <= 1.0 => Ok(Self::Fraction(f)),
                _ => Err(Error::Configuration(format!(
                    "max_features fraction must be in (0, 1], got {n}"
                ))),
            },
            other => Err(Error::Configuration(format!(
                "max_features must be a string or a number, got {other}"
            ))),
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let count = match self {
            Self::All => n_features,
            Self::Sqrt => n.sqrt().ceil() as usize,
            Self::Log2 => n.log2().ceil() as usize,
            Self::Fraction(f) => (n * f).ceil() as usize,
        };
        count.clamp(1, n_features.max(1))
    }
}

/// Bagged ensemble of regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: MaxFeatures,
    bootstrap: bool,
    random_state: i64,
    n_features: Option<usize>,
    trees: Vec<RegressionTree>,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    /// Untrained forest of `n_estimators` fully grown trees.
    #[must_use]
    pub const fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            random_state: DEFAULT_RANDOM_STATE,
            n_features: None,
            trees: Vec::new(),
        }
    }

    /// Build from configuration hyper-parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for values of the wrong type or range.
    pub fn from_params(params: &HyperParameters) -> Result<Self> {
        let mut forest = Self::default();

        if let Some(n) = params.get_usize("n_estimators")? {
            if n == 0 {
                return Err(Error::Configuration(
                    "n_estimators must be at least 1".to_string(),
                ));
            }
            forest.n_estimators = n;
        }
        if let Some(depth) = params.get_usize("max_depth")? {
            if depth == 0 {
                return Err(Error::Configuration("max_depth must be at least 1".to_string()));
            }
            forest.max_depth = Some(depth);
        }
        if let Some(split) = params.get_usize("min_samples_split")? {
            if split < 2 {
                return Err(Error::Configuration(
                    "min_samples_split must be at least 2".to_string(),
                ));
            }
            forest.min_samples_split = split;
        }
        if let Some(leaf) = params.get_usize("min_samples_leaf")? {
            if leaf == 0 {
                return Err(Error::Configuration(
                    "min_samples_leaf must be at least 1".to_string(),
                ));
            }
            forest.min_samples_leaf = leaf;
        }
        if let Some(value) = params.get("max_features") {
            forest.max_features = MaxFeatures::from_value(value)?;
        }
        if let Some(bootstrap) = params.get_bool("bootstrap")? {
            forest.bootstrap = bootstrap;
        }
        if let Some(seed) = params.get_i64("random_state")? {
            forest.random_state = seed;
        }

        Ok(forest)
    }

    /// Limit tree depth.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set the minimum number of rows in a leaf.
    #[must_use]
    pub const fn with_min_samples_leaf(mut self, leaf: usize) -> Self {
        self.min_samples_leaf = leaf;
        self
    }

    /// Set the per-split feature subset.
    #[must_use]
    pub const fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Enable or disable bootstrap sampling.
    #[must_use]
    pub const fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set the base seed.
    #[must_use]
    pub const fn with_random_state(mut self, seed: i64) -> Self {
        self.random_state = seed;
        self
    }

    /// Configured number of trees.
    #[must_use]
    pub const fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    /// Base seed.
    #[must_use]
    pub const fn random_state(&self) -> i64 {
        self.random_state
    }

    /// Fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(Error::Data("forest needs at least one tree".to_string()));
        }

        let n_samples = x.nrows();
        let targets = y.to_vec();
        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.resolve(x.ncols()),
        };

        #[allow(clippy::cast_sign_loss)]
        let base_seed = self.random_state as u64;
        let mut trees = Vec::with_capacity(self.n_estimators);
        for tree_index in 0..self.n_estimators {
            let seed = base_seed.wrapping_add(tree_index as u64);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            let rows: Vec<usize> = if self.bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            trees.push(RegressionTree::grow(x, &targets, rows, params, &mut rng));
        }

        self.trees = trees;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_predict_input(self.n_features, x)?;
        if self.trees.is_empty() {
            return Err(Error::State("forest has no fitted trees".to_string()));
        }

        let n_trees = self.trees.len() as f64;
        let predictions = x
            .rows()
            .into_iter()
            .map(|row| {
                let row = row.to_vec();
                self.trees.iter().map(|t| t.predict_row(&row)).sum::<f64>() / n_trees
            })
            .collect();
        Ok(predictions)
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }
}
