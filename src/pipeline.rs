//! Stage entry points
//!
//! Each function takes the validated [`Config`] by reference and runs one
//! stage to completion. [`run_all`] chains them over a single tracker, which
//! is what makes a `memory:` tracking URI usable end to end.

use tracing::{info, warn};

use crate::config::Config;
use crate::dataset::{fetch_dataset, DatasetSource, SyntheticHousingSource};
use crate::experiment::{open_tracker, Tracker};
use crate::inference::{predict, Features, Observation};
use crate::lifecycle::{select_best, train_all, Direction, LoadedModel, TrainingReport};
use crate::metrics::MAE;
use crate::split::{split, Split};
use crate::storage::Table;
use crate::{Error, Result};

/// Target values are in units of this many dollars
pub const PRICE_UNIT: f64 = 100_000.0;

/// The reference block group used by the predict stage.
#[must_use]
pub fn sample_house() -> Observation {
    Observation::new()
        .with("MedInc", 8.3252)
        .with("HouseAge", 41.0)
        .with("AveRooms", 6.984)
        .with("AveBedrms", 1.023)
        .with("Population", 322.0)
        .with("AveOccup", 2.555)
        .with("Latitude", 37.88)
        .with("Longitude", -122.23)
}

/// Dataset source named by the configuration.
///
/// # Errors
///
/// Returns `Error::Configuration` if a URL is configured but the binary was
/// built without HTTP support.
pub fn dataset_source(config: &Config) -> Result<Box<dyn DatasetSource>> {
    match &config.data.dataset.source_url {
        #[cfg(feature = "fetch")]
        Some(url) => Ok(Box::new(
            crate::dataset::HttpCsvSource::new(url.clone())
                .with_target_column(config.data.dataset.target_column.clone()),
        )),
        #[cfg(not(feature = "fetch"))]
        Some(url) => Err(Error::Configuration(format!(
            "source_url '{url}' requires the 'fetch' feature"
        ))),
        None => {
            warn!("no data.dataset.source_url configured, generating synthetic housing data");
            Ok(Box::new(SyntheticHousingSource::default()))
        }
    }
}

/// Fetch the raw dataset into `data.raw_data_path`.
///
/// # Errors
///
/// Propagates source, schema, and I/O errors.
pub fn fetch(config: &Config) -> Result<Table> {
    let source = dataset_source(config)?;
    fetch_dataset(
        source.as_ref(),
        &config.data.raw_data_path,
        &config.data.dataset.target_column,
    )
}

/// Split the raw dataset and write the four tables to
/// `data.processed_data_path`.
///
/// # Errors
///
/// Returns `Error::Io` if the raw file is missing, plus any split error.
pub fn split_dataset(config: &Config) -> Result<Split> {
    let raw_file = config.raw_data_file();
    let dataset = Table::read_csv(&raw_file)?;
    info!(
        path = %raw_file.display(),
        rows = dataset.num_rows(),
        columns = dataset.num_columns(),
        missing = dataset.missing_count(),
        "raw dataset loaded"
    );

    let dataset_config = &config.data.dataset;
    let result = split(
        &dataset,
        &dataset_config.target_column,
        dataset_config.test_size,
        dataset_config.random_state,
    )?;
    result.save(&config.data.processed_data_path)?;
    Ok(result)
}

/// Train every configured candidate against the persisted split.
///
/// # Errors
///
/// Returns `Error::Io` if the split files are missing, plus tracker errors.
pub fn train_with(config: &Config, tracker: &mut dyn Tracker) -> Result<TrainingReport> {
    let data = Split::load(&config.data.processed_data_path)?;
    let report = train_all(
        tracker,
        config.candidates()?,
        &data,
        &config.tracking.experiment_name,
    )?;

    for (candidate, error) in report.failures() {
        warn!(candidate, %error, "candidate did not train");
    }
    info!(
        experiment = report.experiment_name(),
        trained = report.trained_count(),
        total = report.outcomes().len(),
        "training finished"
    );
    Ok(report)
}

/// [`train_with`] on the configured tracker.
///
/// # Errors
///
/// See [`train_with`]; also fails if the tracker cannot be opened.
pub fn train(config: &Config) -> Result<TrainingReport> {
    let mut tracker = open_tracker(&config.tracking.tracking_uri)?;
    train_with(config, tracker.as_mut())
}

/// Load the lowest-MAE model and price the sample house.
///
/// Returns the selected model and the prediction in target units.
///
/// # Errors
///
/// Returns `Error::NotFound` if nothing has been trained yet.
pub fn predict_sample_with(config: &Config, tracker: &dyn Tracker) -> Result<(LoadedModel, f64)> {
    let loaded = select_best(
        tracker,
        &config.tracking.experiment_name,
        MAE,
        Direction::Minimize,
    )?;
    info!(
        run_id = %loaded.run_id,
        model = %loaded.run_name,
        "loaded model with MAE {:.2}",
        loaded.value
    );

    let prediction = predict(&loaded.model, &Features::Single(sample_house()))?
        .as_scalar()
        .ok_or_else(|| Error::State("single observation produced a batch".to_string()))?;
    info!("predicted price: ${:.2}", prediction * PRICE_UNIT);
    Ok((loaded, prediction))
}

/// [`predict_sample_with`] on the configured tracker.
///
/// # Errors
///
/// See [`predict_sample_with`].
pub fn predict_sample(config: &Config) -> Result<(LoadedModel, f64)> {
    let tracker = open_tracker(&config.tracking.tracking_uri)?;
    predict_sample_with(config, tracker.as_ref())
}

/// Every stage in order over one tracker.
///
/// # Errors
///
/// Stops at the first failing stage.
pub fn run_all(config: &Config) -> Result<f64> {
    let mut tracker = open_tracker(&config.tracking.tracking_uri)?;
    fetch(config)?;
    split_dataset(config)?;
    train_with(config, tracker.as_mut())?;
    let (_, prediction) = predict_sample_with(config, tracker.as_ref())?;
    Ok(prediction)
}
