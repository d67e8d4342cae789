//! Regression metrics
//!
//! All three metrics compare predictions against held-out targets of the
//! same length. The coefficient of determination has one explicit edge-case
//! policy: when the targets are constant (`SS_tot == 0`) it is `0.0`, never a
//! division error or a NaN.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Metric name for mean absolute error
pub const MAE: &str = "mae";
/// Metric name for root mean squared error
pub const RMSE: &str = "rmse";
/// Metric name for the coefficient of determination
pub const R2: &str = "r2";

fn check_lengths(y_true: &[f64], y_pred: &[f64]) -> Result<()> {
    if y_true.is_empty() {
        return Err(Error::Data("cannot score an empty target".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(Error::Data(format!(
            "target has {} rows but predictions have {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Average of `|y_pred - y_true|`.
///
/// # Errors
///
/// Returns `Error::Data` on empty or mismatched inputs.
#[allow(clippy::cast_precision_loss)]
pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let total: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (p - t).abs())
        .sum();
    Ok(total / y_true.len() as f64)
}

/// Square root of the average of `(y_pred - y_true)^2`.
///
/// # Errors
///
/// Returns `Error::Data` on empty or mismatched inputs.
#[allow(clippy::cast_precision_loss)]
pub fn root_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let total: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (p - t).powi(2))
        .sum();
    Ok((total / y_true.len() as f64).sqrt())
}

/// `1 - SS_res / SS_tot`, or exactly `0.0` when `SS_tot == 0`.
///
/// # Errors
///
/// Returns `Error::Data` on empty or mismatched inputs.
#[allow(clippy::cast_precision_loss)]
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return Ok(0.0);
    }
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    Ok(1.0 - ss_res / ss_tot)
}

/// The three metrics recorded for every run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean absolute error
    pub mae: f64,
    /// Root mean squared error
    pub rmse: f64,
    /// Coefficient of determination
    pub r2: f64,
}

impl RegressionMetrics {
    /// Score predictions against targets.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` on empty or mismatched inputs.
    pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Result<Self> {
        Ok(Self {
            mae: mean_absolute_error(y_true, y_pred)?,
            rmse: root_mean_squared_error(y_true, y_pred)?,
            r2: r2_score(y_true, y_pred)?,
        })
    }

    /// `(name, value)` pairs in logging order.
    #[must_use]
    pub fn named(&self) -> [(&'static str, f64); 3] {
        [(MAE, self.mae), (RMSE, self.rmse), (R2, self.r2)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let m = RegressionMetrics::evaluate(&y, &y).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert!((m.r2 - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_known_values() {
        let y_true = [3.0, -0.5, 2.0, 7.0];
        let y_pred = [2.5, 0.0, 2.0, 8.0];

        let mae = mean_absolute_error(&y_true, &y_pred).unwrap();
        assert!((mae - 0.5).abs() < 1e-12);

        let rmse = root_mean_squared_error(&y_true, &y_pred).unwrap();
        assert!((rmse - 0.375_f64.sqrt()).abs() < 1e-12);

        let r2 = r2_score(&y_true, &y_pred).unwrap();
        assert!((r2 - 0.948_608_137_044_967_9).abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target_is_zero() {
        let y_true = [5.0, 5.0, 5.0];
        assert_eq!(r2_score(&y_true, &[1.0, 2.0, 3.0]).unwrap(), 0.0);
        assert_eq!(r2_score(&y_true, &y_true).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch_is_data_error() {
        let err = mean_absolute_error(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_empty_is_data_error() {
        assert!(r2_score(&[], &[]).is_err());
    }

    #[test]
    fn test_named_order() {
        let m = RegressionMetrics { mae: 1.0, rmse: 2.0, r2: 0.5 };
        let names: Vec<_> = m.named().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec![MAE, RMSE, R2]);
    }
}
