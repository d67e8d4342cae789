//! End-to-end tests for training, selection, and inference

use std::collections::BTreeMap;

use housing_mlops::experiment::{FileTracker, InMemoryTracker, RunStatus, Tracker};
use housing_mlops::inference::{predict, Features, Observation};
use housing_mlops::lifecycle::{select_best, train_all, Direction};
use housing_mlops::model::{
    LinearRegression, Model, RandomForestRegressor, Regressor, TrainedModel, LINEAR_REGRESSION,
    RANDOM_FOREST,
};
use housing_mlops::split::split;
use housing_mlops::storage::Table;
use housing_mlops::Error;
use ndarray::{array, Array1};
use tempfile::TempDir;

/// `y = 2 * x1 + 1` with an unrelated second feature
#[allow(clippy::cast_precision_loss)]
fn linear_dataset(rows: usize) -> Table {
    let x1: Vec<f64> = (0..rows).map(|i| i as f64 / 10.0).collect();
    let x2: Vec<f64> = (0..rows).map(|i| ((i * 7) % 13) as f64).collect();
    let y: Vec<f64> = x1.iter().map(|v| 2.0 * v + 1.0).collect();
    Table::from_columns(vec![("x1", x1), ("x2", x2), ("y", y)]).unwrap()
}

fn candidates() -> BTreeMap<String, Model> {
    BTreeMap::from([
        (
            LINEAR_REGRESSION.to_string(),
            Model::LinearRegression(LinearRegression::new()),
        ),
        (
            RANDOM_FOREST.to_string(),
            Model::RandomForest(
                RandomForestRegressor::new(10)
                    .with_max_depth(6)
                    .with_random_state(42),
            ),
        ),
    ])
}

fn trained_model_bytes(slope: f64) -> Vec<u8> {
    let mut model = Model::LinearRegression(LinearRegression::new());
    let x = array![[0.0], [1.0], [2.0], [3.0]];
    let y: Array1<f64> = x.column(0).mapv(|v| slope * v);
    model.fit(&x, &y).unwrap();
    TrainedModel::new(LINEAR_REGRESSION, vec!["x".to_string()], model)
        .unwrap()
        .to_bytes()
        .unwrap()
}

#[test]
fn test_linear_candidate_recovers_exact_relation() {
    let data = split(&linear_dataset(100), "y", 0.2, 42).unwrap();
    let mut tracker = InMemoryTracker::new();

    let report = train_all(&mut tracker, candidates(), &data, "linear").unwrap();
    assert_eq!(report.trained_count(), 2);

    let metrics = report.outcome(LINEAR_REGRESSION).unwrap().metrics().unwrap();
    assert!(metrics.mae < 0.01, "mae = {}", metrics.mae);
    assert!(metrics.r2 > 0.99, "r2 = {}", metrics.r2);

    let runs = tracker.list_runs("linear").unwrap();
    assert_eq!(runs.len(), 2);
    for run in &runs {
        assert_eq!(run.status(), RunStatus::Success);
        assert!(run.metric("mae").is_some());
        assert!(run.metric("rmse").is_some());
        assert!(run.metric("r2").is_some());
        assert!(run.artifact().is_some());
    }

    let best = select_best(&tracker, "linear", "mae", Direction::Minimize).unwrap();
    assert_eq!(best.run_name, LINEAR_REGRESSION);
    assert_eq!(best.model.feature_names(), ["x1", "x2"]);

    let observation = Observation::new().with("x1", 3.0).with("x2", 5.0);
    let price = predict(&best.model, &Features::Single(observation)).unwrap();
    assert!((price.as_scalar().unwrap() - 7.0).abs() < 1e-6);
}

#[test]
fn test_select_best_picks_lowest_mae() {
    let mut tracker = InMemoryTracker::new();
    for (name, mae, slope) in [("a", 3.1, 1.0), ("b", 2.0, 2.0), ("c", 4.5, 3.0)] {
        tracker
            .with_run("ranked", name, |run| {
                run.log_metric("mae", mae)?;
                run.log_model(&trained_model_bytes(slope))?;
                Ok(())
            })
            .unwrap();
    }

    let best = select_best(&tracker, "ranked", "mae", Direction::Minimize).unwrap();
    assert_eq!(best.run_name, "b");
    assert!((best.value - 2.0).abs() < f64::EPSILON);
    assert_eq!(best.metric, "mae");

    let doubled = predict(
        &best.model,
        &Features::Single(Observation::new().with("x", 10.0)),
    )
    .unwrap();
    assert!((doubled.as_scalar().unwrap() - 20.0).abs() < 1e-6);

    let worst = select_best(&tracker, "ranked", "mae", Direction::Maximize).unwrap();
    assert_eq!(worst.run_name, "c");
}

#[test]
fn test_select_best_skips_ineligible_runs() {
    let mut tracker = InMemoryTracker::new();
    // Better metric, but failed
    let _ = tracker.with_run("mixed", "failed", |run| -> housing_mlops::Result<()> {
        run.log_metric("mae", 0.1)?;
        run.log_model(&trained_model_bytes(5.0))?;
        Err(Error::Data("late failure".to_string()))
    });
    // Better metric, but no model
    tracker
        .with_run("mixed", "no_model", |run| run.log_metric("mae", 0.2))
        .unwrap();
    tracker
        .with_run("mixed", "eligible", |run| {
            run.log_metric("mae", 0.9)?;
            run.log_model(&trained_model_bytes(1.0))?;
            Ok(())
        })
        .unwrap();

    let best = select_best(&tracker, "mixed", "mae", Direction::Minimize).unwrap();
    assert_eq!(best.run_name, "eligible");
}

#[test]
fn test_select_best_tie_is_stable() {
    let mut tracker = InMemoryTracker::new();
    for name in ["first", "second", "third"] {
        tracker
            .with_run("tied", name, |run| {
                run.log_metric("mae", 1.0)?;
                run.log_model(&trained_model_bytes(1.0))?;
                Ok(())
            })
            .unwrap();
    }

    let expected = tracker
        .list_runs("tied")
        .unwrap()
        .iter()
        .map(|run| run.run_id().to_string())
        .min()
        .unwrap();
    for _ in 0..3 {
        let best = select_best(&tracker, "tied", "mae", Direction::Minimize).unwrap();
        assert_eq!(best.run_id, expected);
    }
}

#[test]
fn test_select_best_on_missing_or_empty_experiment() {
    let mut tracker = InMemoryTracker::new();
    assert!(matches!(
        select_best(&tracker, "nope", "mae", Direction::Minimize),
        Err(Error::NotFound(_))
    ));

    tracker.get_or_create_experiment("empty").unwrap();
    assert!(matches!(
        select_best(&tracker, "empty", "mae", Direction::Minimize),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_constant_target_records_zero_r2() {
    let x1: Vec<f64> = (0..40).map(|i| f64::from(i) / 4.0).collect();
    let x2: Vec<f64> = (0..40).map(|i| f64::from((i * 5) % 11)).collect();
    let table = Table::from_columns(vec![("x1", x1), ("x2", x2), ("y", vec![5.0; 40])]).unwrap();
    let data = split(&table, "y", 0.25, 3).unwrap();
    assert!(data.test_target.column("y").unwrap().iter().all(|&v| v == 5.0));

    let mut tracker = InMemoryTracker::new();
    let report = train_all(&mut tracker, candidates(), &data, "flat").unwrap();
    assert_eq!(report.trained_count(), 2);

    let runs = tracker.list_runs("flat").unwrap();
    assert_eq!(runs.len(), 2);
    for run in &runs {
        assert_eq!(run.status(), RunStatus::Success);
        assert_eq!(run.metric("r2"), Some(0.0), "{}", run.run_name());
    }
}

#[test]
fn test_treeless_forest_is_recorded_as_failed_run() {
    let data = split(&linear_dataset(60), "y", 0.25, 7).unwrap();
    let mut tracker = InMemoryTracker::new();

    let mut models = candidates();
    models.insert(
        "empty_forest".to_string(),
        Model::RandomForest(RandomForestRegressor::new(0)),
    );

    let report = train_all(&mut tracker, models, &data, "partial").unwrap();
    assert_eq!(report.outcomes().len(), 3);
    assert_eq!(report.trained_count(), 2);

    let failures: Vec<(&str, &Error)> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "empty_forest");
    assert!(matches!(failures[0].1, Error::Training { .. }));

    let runs = tracker.list_runs("partial").unwrap();
    assert_eq!(runs.len(), 3);
    let failed = runs.iter().find(|r| r.run_name() == "empty_forest").unwrap();
    assert_eq!(failed.status(), RunStatus::Failed);
    assert!(failed.artifact().is_none());
    assert!(report.outcome(LINEAR_REGRESSION).unwrap().metrics().is_some());
    assert!(report.outcome(RANDOM_FOREST).unwrap().metrics().is_some());
}

#[test]
fn test_batch_prediction_with_file_tracker() {
    let dir = TempDir::new().unwrap();
    let data = split(&linear_dataset(100), "y", 0.2, 42).unwrap();
    {
        let mut tracker = FileTracker::open(dir.path()).unwrap();
        train_all(&mut tracker, candidates(), &data, "persisted").unwrap();
    }

    let tracker = FileTracker::open(dir.path()).unwrap();
    let best = select_best(&tracker, "persisted", "mae", Direction::Minimize).unwrap();

    let batch: Vec<Observation> = (0..4_u8)
        .map(|i| Observation::new().with("x1", f64::from(i)).with("x2", 0.0))
        .collect();
    let predictions = predict(&best.model, &Features::Batch(batch))
        .unwrap()
        .into_vec();
    assert_eq!(predictions.len(), 4);
    for (i, value) in predictions.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let expected = 2.0 * i as f64 + 1.0;
        assert!((value - expected).abs() < 1e-6);
    }
}
