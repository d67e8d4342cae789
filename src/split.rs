//! Split stage: deterministic train/test partition
//!
//! Rows are permuted by a Fisher–Yates shuffle driven by
//! `ChaCha8Rng::seed_from_u64(random_state as u64)`. The first
//! `round(n * test_size)` shuffled rows form the test partition and the rest
//! the training partition, so the same inputs always yield the same rows in
//! the same order.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::config::validate_test_size;
use crate::storage::Table;
use crate::{Error, Result};

/// Training features file
pub const X_TRAIN_FILE: &str = "X_train.csv";
/// Test features file
pub const X_TEST_FILE: &str = "X_test.csv";
/// Training target file
pub const Y_TRAIN_FILE: &str = "y_train.csv";
/// Test target file
pub const Y_TEST_FILE: &str = "y_test.csv";

/// The four tables of a train/test split.
///
/// Feature and target tables of one partition have the same row count and
/// row order. Target tables hold a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    /// Training features
    pub train_features: Table,
    /// Held-out features
    pub test_features: Table,
    /// Training target (one column)
    pub train_target: Table,
    /// Held-out target (one column)
    pub test_target: Table,
    rows: Option<(Vec<usize>, Vec<usize>)>,
}

impl Split {
    /// Assemble a split from four tables, checking their shapes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if row counts disagree within a partition, a
    /// target table is not single-column, or the feature schemas differ.
    pub fn from_tables(
        train_features: Table,
        test_features: Table,
        train_target: Table,
        test_target: Table,
    ) -> Result<Self> {
        for (name, features, target) in [
            ("train", &train_features, &train_target),
            ("test", &test_features, &test_target),
        ] {
            if features.num_rows() != target.num_rows() {
                return Err(Error::Data(format!(
                    "{name} partition has {} feature rows but {} target rows",
                    features.num_rows(),
                    target.num_rows()
                )));
            }
            if target.num_columns() != 1 {
                return Err(Error::Data(format!(
                    "{name} target must have exactly one column, found {}",
                    target.num_columns()
                )));
            }
        }
        if train_features.column_names() != test_features.column_names() {
            return Err(Error::Data(format!(
                "train features [{}] and test features [{}] differ",
                train_features.column_names().join(", "),
                test_features.column_names().join(", ")
            )));
        }
        if train_target.column_names() != test_target.column_names() {
            return Err(Error::Data("train and test targets name different columns".to_string()));
        }

        Ok(Self {
            train_features,
            test_features,
            train_target,
            test_target,
            rows: None,
        })
    }

    /// Ordered feature schema.
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        self.train_features.column_names()
    }

    /// Name of the target column.
    #[must_use]
    pub fn target_name(&self) -> String {
        self.train_target.column_names().remove(0)
    }

    /// Original dataset rows of the training partition, in partition order.
    /// `None` for a split read back from disk.
    #[must_use]
    pub fn train_rows(&self) -> Option<&[usize]> {
        self.rows.as_ref().map(|(train, _)| train.as_slice())
    }

    /// Original dataset rows of the test partition, in partition order.
    /// `None` for a split read back from disk.
    #[must_use]
    pub fn test_rows(&self) -> Option<&[usize]> {
        self.rows.as_ref().map(|(_, test)| test.as_slice())
    }

    /// Write the four tables into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O or Arrow error if a file cannot be written.
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.train_features.write_csv(dir.join(X_TRAIN_FILE))?;
        self.test_features.write_csv(dir.join(X_TEST_FILE))?;
        self.train_target.write_csv(dir.join(Y_TRAIN_FILE))?;
        self.test_target.write_csv(dir.join(Y_TEST_FILE))?;
        info!(dir = %dir.display(), "split saved");
        Ok(())
    }

    /// Read a split previously written by [`Split::save`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a file is missing and `Error::Data` if the
    /// tables are inconsistent.
    pub fn load(dir: &Path) -> Result<Self> {
        Self::from_tables(
            Table::read_csv(dir.join(X_TRAIN_FILE))?,
            Table::read_csv(dir.join(X_TEST_FILE))?,
            Table::read_csv(dir.join(Y_TRAIN_FILE))?,
            Table::read_csv(dir.join(Y_TEST_FILE))?,
        )
    }
}

/// Number of test rows for `n` rows: `round(n * test_size)`, kept within
/// `1..n` so that neither partition is empty.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn test_row_count(n: usize, test_size: f64) -> usize {
    if n < 2 {
        return 0;
    }
    let rounded = (n as f64 * test_size).round() as usize;
    rounded.clamp(1, n - 1)
}

/// Seeded permutation of `0..n`.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn permutation(n: usize, random_state: i64) -> Vec<usize> {
    // bits reinterpreted, so negative seeds are distinct seeds
    let mut rng = ChaCha8Rng::seed_from_u64(random_state as u64);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    indices
}

/// Partition `dataset` into train/test features and targets.
///
/// # Errors
///
/// Returns `Error::Configuration` if `test_size` is outside `(0, 1)`, and
/// `Error::Data` if `target_column` is absent or the dataset has fewer than
/// two rows.
pub fn split(
    dataset: &Table,
    target_column: &str,
    test_size: f64,
    random_state: i64,
) -> Result<Split> {
    validate_test_size(test_size)?;
    if !dataset.has_column(target_column) {
        return Err(Error::Data(format!(
            "target column '{target_column}' not found (columns: {})",
            dataset.column_names().join(", ")
        )));
    }
    let n = dataset.num_rows();
    if n < 2 {
        return Err(Error::Data(format!(
            "cannot split {n} rows into non-empty train and test partitions"
        )));
    }

    let features = dataset.drop_column(target_column)?;
    let target = dataset.select(&[target_column])?;

    let order = permutation(n, random_state);
    let (test_rows, train_rows) = order.split_at(test_row_count(n, test_size));

    let result = Split {
        train_features: features.take(train_rows)?,
        test_features: features.take(test_rows)?,
        train_target: target.take(train_rows)?,
        test_target: target.take(test_rows)?,
        rows: Some((train_rows.to_vec(), test_rows.to_vec())),
    };

    info!(
        train_rows = train_rows.len(),
        test_rows = test_rows.len(),
        features = result.train_features.num_columns(),
        "dataset split"
    );
    Ok(result)
}
