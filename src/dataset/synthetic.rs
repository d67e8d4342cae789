//! Seeded stand-in for the housing dataset
//!
//! Feature ranges follow the real census blocks; the target is a noisy
//! linear function of income, age, and occupancy, clipped to the real
//! target's range of `[0.15, 5.0]`.

use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{DatasetSource, FEATURE_COLUMNS, TARGET_COLUMN};
use crate::storage::Table;
use crate::Result;

/// Rows in the real dataset
pub const HOUSING_ROWS: usize = 20_640;

/// `(low, high)` range per feature, in `FEATURE_COLUMNS` order
const FEATURE_RANGES: [(f64, f64); 8] = [
    (0.5, 15.0),
    (1.0, 52.0),
    (2.0, 10.0),
    (0.8, 1.5),
    (3.0, 5000.0),
    (1.0, 6.0),
    (32.5, 42.0),
    (-124.3, -114.3),
];

/// Deterministic synthetic housing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticHousingSource {
    rows: usize,
    seed: u64,
}

impl Default for SyntheticHousingSource {
    fn default() -> Self {
        Self::new(HOUSING_ROWS, 0)
    }
}

impl SyntheticHousingSource {
    /// Generator for `rows` rows from `seed`.
    #[must_use]
    pub const fn new(rows: usize, seed: u64) -> Self {
        Self { rows, seed }
    }

    /// Generate the table without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if the generated columns cannot form a table.
    pub fn generate(&self) -> Result<Table> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut features: Vec<Vec<f64>> = vec![Vec::with_capacity(self.rows); FEATURE_COLUMNS.len()];
        let mut target = Vec::with_capacity(self.rows);

        for _ in 0..self.rows {
            let row: Vec<f64> = FEATURE_RANGES
                .iter()
                .map(|&(low, high)| rng.gen_range(low..high))
                .collect();
            let (income, age, occupancy) = (row[0], row[1].round(), row[5]);
            let noise = rng.gen_range(-0.25..0.25);
            let value = 0.15 + 0.42 * income + 0.01 * age - 0.03 * occupancy + noise;
            target.push(value.clamp(0.15, 5.0));

            for (column, (index, value)) in features.iter_mut().zip(row.into_iter().enumerate()) {
                // Counts are whole numbers in the census data
                let value = if index == 1 || index == 4 { value.round() } else { value };
                column.push(value);
            }
        }

        let mut columns: Vec<(&str, Vec<f64>)> =
            FEATURE_COLUMNS.iter().copied().zip(features).collect();
        columns.push((TARGET_COLUMN, target));
        Table::from_columns(columns)
    }
}

impl DatasetSource for SyntheticHousingSource {
    fn describe(&self) -> String {
        format!("synthetic housing data ({} rows, seed {})", self.rows, self.seed)
    }

    fn fetch(&self, _cache_dir: &Path) -> Result<Table> {
        self.generate()
    }
}
