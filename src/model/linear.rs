//! Ordinary least squares

use super::{check_fit_input, check_predict_input, Regressor};
use crate::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve the symmetric positive-definite system `a * x = b` by Cholesky
/// factorisation. Returns `None` if `a` is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Solve the normal equations `(X^T X) w = X^T y`, adding a tiny ridge when
/// `X^T X` is singular (constant or collinear columns).
#[allow(clippy::cast_precision_loss)]
fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>) -> Option<Array1<f64>> {
    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);

    if let Some(w) = cholesky_solve(&xtx, &xty) {
        return Some(w);
    }

    let n = xtx.nrows();
    let mean_diag = xtx.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
    if mean_diag == 0.0 {
        // Every column is identically zero: no direction carries signal
        return Some(Array1::zeros(n));
    }
    let mut regularized = xtx;
    let ridge = 1e-8 * mean_diag;
    for k in 0..n {
        regularized[[k, k]] += ridge;
    }
    cholesky_solve(&regularized, &xty)
}

/// Linear regression fitted by ordinary least squares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    fit_intercept: bool,
    coefficients: Option<Vec<f64>>,
    intercept: f64,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Untrained model that fits an intercept.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fit_intercept: true,
            coefficients: None,
            intercept: 0.0,
        }
    }

    /// Enable or disable the intercept term.
    #[must_use]
    pub const fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Fitted weights, one per feature.
    #[must_use]
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }

    /// Fitted intercept (`0.0` when disabled or unfitted).
    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;

        let (weights, intercept) = if self.fit_intercept {
            let x_mean = x
                .mean_axis(Axis(0))
                .ok_or_else(|| Error::Data("cannot average an empty matrix".to_string()))?;
            let y_mean = y.mean().unwrap_or(0.0);
            let x_centered = x - &x_mean.clone().insert_axis(Axis(0));
            let y_centered = y - y_mean;

            let weights = solve_normal_equations(&x_centered, &y_centered)
                .ok_or_else(|| Error::Data("normal equations are singular".to_string()))?;
            let intercept = y_mean - weights.dot(&x_mean);
            (weights, intercept)
        } else {
            let weights = solve_normal_equations(x, y)
                .ok_or_else(|| Error::Data("normal equations are singular".to_string()))?;
            (weights, 0.0)
        };

        self.coefficients = Some(weights.to_vec());
        self.intercept = intercept;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_predict_input(self.n_features(), x)?;
        let weights = self
            .coefficients
            .as_ref()
            .ok_or_else(|| Error::State("model is not fitted".to_string()))?;
        Ok(x.dot(&Array1::from_vec(weights.clone())) + self.intercept)
    }

    fn n_features(&self) -> Option<usize> {
        self.coefficients.as_ref().map(Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_exact_line() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-10);
        assert!((model.intercept() - 1.0).abs() < 1e-10);

        let pred = model.predict(&array![[10.0]]).unwrap();
        assert!((pred[0] - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_multivariate() {
        let x = array![
            [1.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [2.0, 1.0],
            [1.0, 3.0],
        ];
        let y = x.rows().into_iter().map(|r| 3.0 * r[0] - 2.0 * r[1] + 0.5).collect::<Array1<f64>>();

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_column_does_not_fail() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0]];
        let y = array![3.0, 5.0, 7.0, 9.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-6);
        }
    }

    #[test]
    fn test_without_intercept() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![2.0, 4.0, 6.0];
        let mut model = LinearRegression::new().with_fit_intercept(false);
        model.fit(&x, &y).unwrap();
        assert!((model.coefficients().unwrap()[0] - 2.0).abs() < 1e-12);
        assert_eq!(model.intercept(), 0.0);
    }

    #[test]
    fn test_predict_wrong_width_is_schema_error() {
        let mut model = LinearRegression::new();
        model.fit(&array![[1.0], [2.0]], &array![1.0, 2.0]).unwrap();
        let err = model.predict(&array![[1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }
}
