//! Inference stage
//!
//! Input is explicitly tagged as one observation or a batch, and is checked
//! against the model's training schema (names and order) before any
//! arithmetic happens.

use ndarray::Array2;

use crate::model::TrainedModel;
use crate::storage::Table;
use crate::{Error, Result};

/// One observation: feature values in a fixed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    values: Vec<(String, f64)>,
}

impl Observation {
    /// Empty observation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a feature value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.push((name.into(), value));
        self
    }

    /// Feature names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    /// Feature values in order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().map(|&(_, value)| value)
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Observation {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        }
    }
}

/// Input to [`predict`].
#[derive(Debug, Clone, PartialEq)]
pub enum Features {
    /// A single observation; yields [`Prediction::Scalar`]
    Single(Observation),
    /// Several observations; yields [`Prediction::Batch`]
    Batch(Vec<Observation>),
    /// A rectangular table; yields [`Prediction::Batch`]
    Table(Table),
}

/// Output of [`predict`], shaped like its input.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// Prediction for a single observation
    Scalar(f64),
    /// One prediction per input row, in input order
    Batch(Vec<f64>),
}

impl Prediction {
    /// The value of a scalar prediction.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(value) => Some(*value),
            Self::Batch(_) => None,
        }
    }

    /// All values, a scalar becoming a one-element vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        match self {
            Self::Scalar(value) => vec![value],
            Self::Batch(values) => values,
        }
    }
}

fn check_schema<'a>(
    expected: &[String],
    actual: impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<()> {
    let actual: Vec<&str> = actual.collect();
    if actual.iter().copied().eq(expected.iter().map(String::as_str)) {
        Ok(())
    } else {
        Err(Error::Schema(format!(
            "{what} has features [{}], model expects [{}]",
            actual.join(", "),
            expected.join(", ")
        )))
    }
}

/// Predict with a trained model.
///
/// # Errors
///
/// Returns `Error::Schema` if feature names or their order differ from the
/// training schema.
pub fn predict(model: &TrainedModel, features: &Features) -> Result<Prediction> {
    let schema = model.feature_names();
    match features {
        Features::Single(observation) => {
            check_schema(schema, observation.names(), "observation")?;
            let row = Array2::from_shape_vec((1, schema.len()), observation.values().collect())
                .map_err(|e| Error::Schema(e.to_string()))?;
            let values = model.predict_matrix(&row)?;
            let value = values
                .first()
                .copied()
                .ok_or_else(|| Error::State("model returned no prediction".to_string()))?;
            Ok(Prediction::Scalar(value))
        }
        Features::Batch(observations) => {
            if observations.is_empty() {
                return Ok(Prediction::Batch(Vec::new()));
            }
            let mut cells = Vec::with_capacity(observations.len() * schema.len());
            for (index, observation) in observations.iter().enumerate() {
                check_schema(schema, observation.names(), &format!("observation {index}"))?;
                cells.extend(observation.values());
            }
            let rows = Array2::from_shape_vec((observations.len(), schema.len()), cells)
                .map_err(|e| Error::Schema(e.to_string()))?;
            Ok(Prediction::Batch(model.predict_matrix(&rows)?.to_vec()))
        }
        Features::Table(table) => {
            let names = table.column_names();
            check_schema(schema, names.iter().map(String::as_str), "table")?;
            if table.num_rows() == 0 {
                return Ok(Prediction::Batch(Vec::new()));
            }
            Ok(Prediction::Batch(
                model.predict_matrix(&table.to_matrix())?.to_vec(),
            ))
        }
    }
}
