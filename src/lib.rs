//! # housing-mlops: Batch Regression Pipeline with Experiment Tracking
//!
//! Fetches the housing dataset, splits it deterministically, trains a small
//! set of regression candidates, records each candidate's metrics and model
//! artifact as a tracked run, and later loads the best run for inference.
//!
//! ## Pipeline
//!
//! ```text
//! Config ─▶ dataset ─▶ split ─▶ lifecycle::train_all ─▶ Tracker
//!                                                         │
//!               inference::predict ◀─ lifecycle::select_best
//! ```
//!
//! ## Design Principles
//!
//! - **No globals**: one validated [`config::Config`] is passed by reference
//! - **Scoped runs**: [`experiment::RunScope`] closes its run on every exit path
//! - **Deterministic**: seeded split permutation and forest bootstrap, and a
//!   fixed tie-break when selecting the best run
//! - **Tagged inference input**: single observation vs batch, schema-checked
//!
//! ## Example Usage
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use housing_mlops::experiment::InMemoryTracker;
//! use housing_mlops::inference::{predict, Features, Observation};
//! use housing_mlops::lifecycle::{select_best, train_all, Direction};
//! use housing_mlops::model::{LinearRegression, Model};
//! use housing_mlops::split::split;
//! use housing_mlops::storage::Table;
//!
//! let x: Vec<f64> = (0..50).map(f64::from).collect();
//! let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 2.0).collect();
//! let table = Table::from_columns(vec![("x", x), ("y", y)])?;
//! let data = split(&table, "y", 0.2, 42)?;
//!
//! let mut tracker = InMemoryTracker::new();
//! let candidates = BTreeMap::from([(
//!     "linear_regression".to_string(),
//!     Model::LinearRegression(LinearRegression::new()),
//! )]);
//! train_all(&mut tracker, candidates, &data, "demo")?;
//!
//! let best = select_best(&tracker, "demo", "mae", Direction::Minimize)?;
//! let price = predict(&best.model, &Features::Single(Observation::new().with("x", 10.0)))?;
//! assert!((price.as_scalar().unwrap() - 28.0).abs() < 1e-6);
//! # Ok::<(), housing_mlops::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod inference;
pub mod lifecycle;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod split;
pub mod storage;

pub use error::{Error, Result};
