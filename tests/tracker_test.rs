//! Integration tests for the tracker backends
//!
//! The same lifecycle scenarios run against the in-memory and filesystem
//! trackers; the file tracker is also reopened to check persistence.

use housing_mlops::experiment::{
    content_hash, open_tracker, FileTracker, InMemoryTracker, RunScope, RunStatus, Tracker,
    MODEL_ARTIFACT_KEY,
};
use housing_mlops::Error;
use tempfile::TempDir;

fn exercise_lifecycle(tracker: &mut dyn Tracker) {
    let experiment = tracker.get_or_create_experiment("housing").unwrap();
    let again = tracker.get_or_create_experiment("housing").unwrap();
    assert_eq!(experiment.experiment_id(), again.experiment_id());

    let run = tracker
        .create_run(experiment.experiment_id(), "linear_regression")
        .unwrap();
    assert_eq!(run.status(), RunStatus::Running);

    // Open runs are not listed
    assert!(tracker.list_runs("housing").unwrap().is_empty());

    tracker.log_metric(run.run_id(), "mae", 0.9).unwrap();
    tracker.log_metric(run.run_id(), "mae", 0.5).unwrap();
    tracker.log_metric(run.run_id(), "r2", 0.6).unwrap();
    let artifact = tracker
        .log_artifact(run.run_id(), MODEL_ARTIFACT_KEY, b"model bytes")
        .unwrap();
    assert_eq!(artifact.cas_hash(), content_hash(b"model bytes"));

    let second = tracker.log_artifact(run.run_id(), MODEL_ARTIFACT_KEY, b"other");
    assert!(matches!(second, Err(Error::State(_))));

    let closed = tracker.complete_run(run.run_id(), RunStatus::Success).unwrap();
    assert_eq!(closed.status(), RunStatus::Success);
    assert!(closed.ended_at().is_some());

    assert!(matches!(
        tracker.log_metric(run.run_id(), "rmse", 1.0),
        Err(Error::State(_))
    ));
    assert!(matches!(
        tracker.complete_run(run.run_id(), RunStatus::Failed),
        Err(Error::State(_))
    ));

    let runs = tracker.list_runs("housing").unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].metric("mae"), Some(0.5));
    assert_eq!(runs[0].metrics().len(), 2);

    let stored = runs[0].artifact().unwrap();
    assert_eq!(tracker.load_artifact(stored).unwrap(), b"model bytes");
}

#[test]
fn test_memory_tracker_lifecycle() {
    exercise_lifecycle(&mut InMemoryTracker::new());
}

#[test]
fn test_file_tracker_lifecycle() {
    let dir = TempDir::new().unwrap();
    exercise_lifecycle(&mut FileTracker::open(dir.path()).unwrap());
}

#[test]
fn test_unknown_experiment_and_run() {
    let mut tracker = InMemoryTracker::new();
    assert!(tracker.find_experiment("missing").unwrap().is_none());
    assert!(matches!(
        tracker.list_runs("missing"),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        tracker.create_run("no-such-experiment", "rf"),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        tracker.log_metric("no-such-run", "mae", 1.0),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_file_tracker_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let run_id = {
        let mut tracker = FileTracker::open(dir.path()).unwrap();
        tracker
            .with_run("housing", "random_forest", |run| {
                run.log_metric("mae", 0.33)?;
                run.log_model(b"{\"forest\":true}")?;
                Ok(run.run_id().to_string())
            })
            .unwrap()
    };

    let reopened = FileTracker::open(dir.path()).unwrap();
    let runs = reopened.list_runs("housing").unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id(), run_id);
    assert_eq!(runs[0].run_name(), "random_forest");
    assert_eq!(runs[0].status(), RunStatus::Success);
    assert_eq!(runs[0].metric("mae"), Some(0.33));
    assert_eq!(
        reopened.load_artifact(runs[0].artifact().unwrap()).unwrap(),
        b"{\"forest\":true}"
    );
}

#[test]
fn test_file_tracker_detects_tampered_blob() {
    let dir = TempDir::new().unwrap();
    let mut tracker = FileTracker::open(dir.path()).unwrap();
    tracker
        .with_run("housing", "linear_regression", |run| {
            run.log_model(b"original")?;
            Ok(())
        })
        .unwrap();

    let runs = tracker.list_runs("housing").unwrap();
    let artifact = runs[0].artifact().unwrap();
    let blob = dir.path().join("artifacts").join(artifact.cas_hash());
    std::fs::write(&blob, b"tampered").unwrap();

    assert!(matches!(
        tracker.load_artifact(artifact),
        Err(Error::Artifact(_))
    ));
}

#[test]
fn test_identical_models_share_one_blob() {
    let mut tracker = InMemoryTracker::new();
    for name in ["a", "b"] {
        tracker
            .with_run("housing", name, |run| {
                run.log_model(b"same")?;
                Ok(())
            })
            .unwrap();
    }
    assert_eq!(tracker.run_count(), 2);
    assert_eq!(tracker.artifact_count(), 1);
}

#[test]
fn test_open_tracker_by_uri() {
    let dir = TempDir::new().unwrap();
    let uri = format!("file://{}", dir.path().join("mlruns").display());

    let mut tracker = open_tracker(&uri).unwrap();
    RunScope::run(tracker.as_mut(), "housing", "linear_regression", |run| {
        run.log_metric("mae", 0.7)
    })
    .unwrap();
    drop(tracker);

    let reopened = FileTracker::open(dir.path().join("mlruns")).unwrap();
    assert_eq!(reopened.list_runs("housing").unwrap().len(), 1);

    let memory = open_tracker("memory:").unwrap();
    assert!(memory.find_experiment("housing").unwrap().is_none());
}
