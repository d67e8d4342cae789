//! Dataset stage: materialize the raw housing table on disk
//!
//! A [`DatasetSource`] produces the table; [`fetch_dataset`] checks it and
//! writes it as `california_housing.csv` under the raw data directory.

#[cfg(feature = "fetch")]
mod http;
mod synthetic;

#[cfg(feature = "fetch")]
pub use http::HttpCsvSource;
pub use synthetic::{SyntheticHousingSource, HOUSING_ROWS};

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::config::RAW_DATA_FILE;
use crate::storage::Table;
use crate::{Error, Result};

/// Feature columns of the housing dataset, in schema order
pub const FEATURE_COLUMNS: [&str; 8] = [
    "MedInc",
    "HouseAge",
    "AveRooms",
    "AveBedrms",
    "Population",
    "AveOccup",
    "Latitude",
    "Longitude",
];

/// Target column of the housing dataset
pub const TARGET_COLUMN: &str = "MedHouseVal";

/// Provider of the raw tabular dataset.
pub trait DatasetSource {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Produce the dataset, using `cache_dir` for any downloaded files.
    ///
    /// # Errors
    ///
    /// Returns `Error::Fetch` if the data cannot be obtained and
    /// `Error::Data` if it does not have the expected schema.
    fn fetch(&self, cache_dir: &Path) -> Result<Table>;
}

/// Check that `table` carries every housing feature plus `target_column`.
///
/// # Errors
///
/// Returns `Error::Data` listing the missing columns.
pub fn validate_schema(table: &Table, target_column: &str) -> Result<()> {
    let missing: Vec<&str> = FEATURE_COLUMNS
        .iter()
        .copied()
        .chain(std::iter::once(target_column))
        .filter(|name| !table.has_column(name))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Data(format!(
            "dataset is missing columns [{}]",
            missing.join(", ")
        )))
    }
}

/// Fetch the dataset from `source` and persist it under `raw_data_path`.
///
/// The directory is created if absent; an existing raw file is replaced.
///
/// # Errors
///
/// Returns the source's error, `Error::Data` if the target column is
/// absent, or an I/O error if the file cannot be written.
pub fn fetch_dataset(
    source: &dyn DatasetSource,
    raw_data_path: &Path,
    target_column: &str,
) -> Result<Table> {
    fs::create_dir_all(raw_data_path)?;
    info!(source = %source.describe(), "fetching dataset");

    let table = source.fetch(raw_data_path)?;
    if !table.has_column(target_column) {
        return Err(Error::Data(format!(
            "target column '{target_column}' not found in dataset (columns: {})",
            table.column_names().join(", ")
        )));
    }

    let path = raw_data_path.join(RAW_DATA_FILE);
    table.write_csv(&path)?;

    let missing = table.missing_count();
    info!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        missing,
        path = %path.display(),
        "dataset saved"
    );
    if missing > 0 {
        warn!(missing, "dataset contains missing values");
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fetch_dataset_writes_raw_file() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("raw");
        let source = SyntheticHousingSource::new(50, 1);

        let table = fetch_dataset(&source, &raw, TARGET_COLUMN).unwrap();
        assert_eq!(table.num_rows(), 50);
        assert_eq!(table.num_columns(), 9);

        let reread = Table::read_csv(raw.join(RAW_DATA_FILE)).unwrap();
        assert_eq!(reread.column_names(), table.column_names());
        assert_eq!(reread.num_rows(), 50);
    }

    #[test]
    fn test_fetch_dataset_requires_target() {
        let dir = TempDir::new().unwrap();
        let source = SyntheticHousingSource::new(10, 1);
        let err = fetch_dataset(&source, dir.path(), "Price").unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_validate_schema_lists_missing_columns() {
        let table = Table::from_columns(vec![("MedInc", vec![1.0])]).unwrap();
        let err = validate_schema(&table, TARGET_COLUMN).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("HouseAge"));
        assert!(message.contains(TARGET_COLUMN));
        assert!(!message.contains("MedInc,"));
    }
}
