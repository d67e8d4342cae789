//! Tabular storage (Arrow in memory, delimited text on disk)
//!
//! Every table in the pipeline is rectangular and numeric: a single Arrow
//! `RecordBatch` of non-null `Float64` columns. On disk the same table is a
//! comma-delimited file with a header row of column names.
//!
//! Write pattern is whole-table only: stages read a table, derive a new one,
//! and write it out in full. There are no in-place row updates.

use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, Float64Array, UInt64Array};
use arrow::compute::take_record_batch;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// Rows per batch when reading CSV files
const CSV_BATCH_ROWS: usize = 8192;

/// Rectangular numeric table with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    /// Wrap an existing record batch.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if any column is not a non-null `Float64` column.
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        for (field, column) in batch.schema().fields().iter().zip(batch.columns()) {
            if field.data_type() != &DataType::Float64 {
                return Err(Error::Data(format!(
                    "column '{}' has type {}, expected Float64",
                    field.name(),
                    field.data_type()
                )));
            }
            if column.null_count() > 0 {
                return Err(Error::Data(format!(
                    "column '{}' contains {} empty cells",
                    field.name(),
                    column.null_count()
                )));
            }
        }
        Ok(Self { batch })
    }

    /// Build a table from named columns.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if there are no columns, names repeat, or the
    /// columns differ in length.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<f64>)>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::Data("a table needs at least one column".to_string()));
        }

        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
        let mut seen = HashSet::new();
        for (name, values) in columns {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(Error::Data(format!("duplicate column '{name}'")));
            }
            fields.push(Field::new(name, DataType::Float64, false));
            arrays.push(Arc::new(Float64Array::from(values)));
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .map_err(|e| Error::Data(format!("columns do not form a table: {e}")))?;
        Ok(Self { batch })
    }

    /// Build a table from a row-major matrix and its column names.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if the name count differs from the column count.
    pub fn from_matrix<S: Into<String>>(names: Vec<S>, matrix: &Array2<f64>) -> Result<Self> {
        if names.len() != matrix.ncols() {
            return Err(Error::Data(format!(
                "{} column names for a matrix with {} columns",
                names.len(),
                matrix.ncols()
            )));
        }
        let columns = names
            .into_iter()
            .zip(matrix.columns())
            .map(|(name, column)| (name, column.to_vec()))
            .collect();
        Self::from_columns(columns)
    }

    /// Read a delimited text table with a header row.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be opened and `Error::Data` if
    /// the header is missing or a cell is not a number.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let names = read_header(path)?;

        let fields: Vec<Field> = names
            .iter()
            .map(|name| Field::new(name.as_str(), DataType::Float64, false))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let reader = ReaderBuilder::new(schema.clone())
            .with_header(true)
            .with_batch_size(CSV_BATCH_ROWS)
            .build(File::open(path)?)
            .map_err(|e| Error::Data(format!("{}: {e}", path.display())))?;

        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch.map_err(|e| Error::Data(format!("{}: {e}", path.display())))?);
        }

        let batch = arrow::compute::concat_batches(&schema, &batches)?;
        Self::from_batch(batch)
    }

    /// Write the table as delimited text with a header row.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` or `Error::Arrow` if the file cannot be written.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .build(File::create(path)?);
        writer.write(&self.batch)?;
        Ok(())
    }

    /// Underlying record batch.
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of rows (observations).
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Column names in table order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Whether a column with this name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    /// Values of one column.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if the column is absent.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        let index = self.index_of(name)?;
        let values: &[f64] = self
            .batch
            .column(index)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| Error::Data(format!("column '{name}' is not Float64")))?
            .values();
        Ok(values)
    }

    /// Keep only the named columns, in the given order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if any column is absent.
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let indices = names
            .iter()
            .map(|name| self.index_of(name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            batch: self.batch.project(&indices)?,
        })
    }

    /// Remove one column.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if the column is absent or is the only column.
    pub fn drop_column(&self, name: &str) -> Result<Self> {
        let dropped = self.index_of(name)?;
        if self.num_columns() == 1 {
            return Err(Error::Data(format!(
                "cannot drop '{name}', it is the only column"
            )));
        }
        let keep: Vec<usize> = (0..self.num_columns()).filter(|&i| i != dropped).collect();
        Ok(Self {
            batch: self.batch.project(&keep)?,
        })
    }

    /// Gather rows by index, in the order given.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if an index is out of bounds.
    pub fn take(&self, rows: &[usize]) -> Result<Self> {
        if let Some(&bad) = rows.iter().find(|&&row| row >= self.num_rows()) {
            return Err(Error::Data(format!(
                "row {bad} out of bounds (table has {} rows)",
                self.num_rows()
            )));
        }
        let indices = UInt64Array::from_iter_values(rows.iter().map(|&row| row as u64));
        Ok(Self {
            batch: take_record_batch(&self.batch, &indices)?,
        })
    }

    /// Copy the table into a row-major `rows x columns` matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Array2<f64> {
        let mut matrix = Array2::zeros((self.num_rows(), self.num_columns()));
        for (j, column) in self.batch.columns().iter().enumerate() {
            if let Some(values) = column.as_any().downcast_ref::<Float64Array>() {
                for (i, value) in values.values().iter().enumerate() {
                    matrix[[i, j]] = *value;
                }
            }
        }
        matrix
    }

    /// Count of NaN cells.
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.batch
            .columns()
            .iter()
            .filter_map(|c| c.as_any().downcast_ref::<Float64Array>())
            .map(|values| values.values().iter().filter(|v| v.is_nan()).count())
            .sum()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.batch.schema().index_of(name).map_err(|_| {
            Error::Data(format!(
                "column '{name}' not found (available: {})",
                self.column_names().join(", ")
            ))
        })
    }
}

/// Parse the header row into column names.
fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut line)?;

    let names: Vec<String> = line
        .trim_end_matches(['\r', '\n'])
        .split(',')
        .map(|name| name.trim().trim_matches('"').to_string())
        .collect();

    if names.iter().all(String::is_empty) {
        return Err(Error::Data(format!(
            "{}: missing header row",
            path.display()
        )));
    }
    if let Some(blank) = names.iter().position(String::is_empty) {
        return Err(Error::Data(format!(
            "{}: header column {blank} has no name",
            path.display()
        )));
    }
    Ok(names)
}
