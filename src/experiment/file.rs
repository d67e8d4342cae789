//! Filesystem tracker (`file:<dir>` or bare path URI)
//!
//! ```text
//! <root>/experiments.json                      experiment index
//! <root>/<experiment_id>/<run_id>/run.json     run record with metrics
//! <root>/artifacts/sha256-<hex>                content-addressed blobs
//! ```
//!
//! Every JSON file is written to a sibling temp file and renamed into place,
//! so readers never observe a half-written record.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::artifact_record::is_content_hash;
use super::tracker::new_id;
use super::{ArtifactRecord, ExperimentRecord, MetricRecord, RunRecord, RunStatus, Tracker};
use crate::{Error, Result};

const EXPERIMENTS_FILE: &str = "experiments.json";
const RUN_FILE: &str = "run.json";
const ARTIFACTS_DIR: &str = "artifacts";

fn storage_error(action: &str, path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Storage(format!("cannot {action} {}: {err}", path.display()))
}

/// IDs become directory names; anything but `[A-Za-z0-9_-]` is rejected.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Tracker persisting to a directory tree.
#[derive(Debug, Clone)]
pub struct FileTracker {
    root: PathBuf,
}

impl FileTracker {
    /// Open (creating if needed) a tracker rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let artifacts = root.join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts).map_err(|e| storage_error("create", &artifacts, e))?;
        debug!(root = %root.display(), "file tracker opened");
        Ok(Self { root })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let bytes = fs::read(path).map_err(|e| storage_error("read", path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| storage_error("decode", path, e))
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| storage_error("create", parent, e))?;
        }
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| storage_error("write", &tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| storage_error("replace", path, e))
    }

    fn read_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        let path = self.root.join(EXPERIMENTS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Self::read_json(&path)
    }

    fn run_path(&self, experiment_id: &str, run_id: &str) -> PathBuf {
        self.root.join(experiment_id).join(run_id).join(RUN_FILE)
    }

    fn locate_run(&self, run_id: &str) -> Result<PathBuf> {
        if is_safe_id(run_id) {
            for experiment in self.read_experiments()? {
                let path = self.run_path(experiment.experiment_id(), run_id);
                if path.is_file() {
                    return Ok(path);
                }
            }
        }
        Err(Error::NotFound(format!("run '{run_id}'")))
    }

    /// Load, mutate, and write back a run record.
    fn update_run(
        &self,
        run_id: &str,
        mutate: impl FnOnce(&mut RunRecord) -> Result<()>,
    ) -> Result<RunRecord> {
        let path = self.locate_run(run_id)?;
        let mut run: RunRecord = Self::read_json(&path)?;
        mutate(&mut run)?;
        Self::write_json(&path, &run)?;
        Ok(run)
    }

    fn blob_path(&self, cas_hash: &str) -> PathBuf {
        self.root.join(ARTIFACTS_DIR).join(cas_hash)
    }

    fn write_blob(&self, artifact: &ArtifactRecord, bytes: &[u8]) -> Result<()> {
        let path = self.blob_path(artifact.cas_hash());
        if path.is_file() {
            return Ok(());
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| storage_error("write", &tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| storage_error("replace", &path, e))
    }
}

impl Tracker for FileTracker {
    fn get_or_create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        let mut experiments = self.read_experiments()?;
        if let Some(existing) = experiments.iter().find(|e| e.name() == name) {
            return Ok(existing.clone());
        }

        let experiment = ExperimentRecord::new(new_id(), name);
        experiments.push(experiment.clone());
        Self::write_json(&self.root.join(EXPERIMENTS_FILE), &experiments)?;
        info!(experiment = name, id = experiment.experiment_id(), "experiment created");
        Ok(experiment)
    }

    fn find_experiment(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        Ok(self
            .read_experiments()?
            .into_iter()
            .find(|e| e.name() == name))
    }

    fn create_run(&mut self, experiment_id: &str, run_name: &str) -> Result<RunRecord> {
        if !self
            .read_experiments()?
            .iter()
            .any(|e| e.experiment_id() == experiment_id)
        {
            return Err(Error::NotFound(format!("experiment id '{experiment_id}'")));
        }
        let run = RunRecord::new(new_id(), experiment_id, run_name);
        Self::write_json(&self.run_path(experiment_id, run.run_id()), &run)?;
        Ok(run)
    }

    fn log_metric(&mut self, run_id: &str, key: &str, value: f64) -> Result<()> {
        self.update_run(run_id, |run| {
            run.record_metric(MetricRecord::new(run_id, key, value))
        })?;
        Ok(())
    }

    fn log_artifact(&mut self, run_id: &str, key: &str, bytes: &[u8]) -> Result<ArtifactRecord> {
        let artifact = ArtifactRecord::for_content(run_id, key, bytes);
        self.update_run(run_id, |run| {
            run.attach_artifact(artifact.clone())?;
            // Blob lands before the record that points at it
            self.write_blob(&artifact, bytes)
        })?;
        Ok(artifact)
    }

    fn complete_run(&mut self, run_id: &str, status: RunStatus) -> Result<RunRecord> {
        self.update_run(run_id, |run| run.complete(status))
    }

    fn list_runs(&self, experiment_name: &str) -> Result<Vec<RunRecord>> {
        let experiment = self
            .find_experiment(experiment_name)?
            .ok_or_else(|| Error::NotFound(format!("experiment '{experiment_name}'")))?;

        let dir = self.root.join(experiment.experiment_id());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error("list", &dir, e)),
        };

        let mut runs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| storage_error("list", &dir, e))?;
            let path = entry.path().join(RUN_FILE);
            if !path.is_file() {
                continue;
            }
            let run: RunRecord = Self::read_json(&path)?;
            if run.is_closed() {
                runs.push(run);
            }
        }
        runs.sort_by(|a, b| {
            a.started_at()
                .cmp(&b.started_at())
                .then_with(|| a.run_id().cmp(b.run_id()))
        });
        Ok(runs)
    }

    fn load_artifact(&self, artifact: &ArtifactRecord) -> Result<Vec<u8>> {
        if !is_content_hash(artifact.cas_hash()) {
            return Err(Error::Artifact(format!(
                "malformed artifact hash '{}'",
                artifact.cas_hash()
            )));
        }
        let path = self.blob_path(artifact.cas_hash());
        let bytes = fs::read(&path).map_err(|e| {
            Error::Artifact(format!("cannot read artifact {}: {e}", path.display()))
        })?;
        if !artifact.matches(&bytes) {
            return Err(Error::Artifact(format!(
                "artifact {} does not match its hash",
                path.display()
            )));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_runs_persist_across_instances() {
        let dir = TempDir::new().unwrap();

        let run_id = {
            let mut tracker = FileTracker::open(dir.path()).unwrap();
            let exp = tracker.get_or_create_experiment("housing").unwrap();
            let run = tracker.create_run(exp.experiment_id(), "rf").unwrap();
            tracker.log_metric(run.run_id(), "mae", 0.4).unwrap();
            tracker.log_artifact(run.run_id(), "model", b"{}").unwrap();
            tracker.complete_run(run.run_id(), RunStatus::Success).unwrap();
            run.run_id().to_string()
        };

        let tracker = FileTracker::open(dir.path()).unwrap();
        let runs = tracker.list_runs("housing").unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id(), run_id);
        assert_eq!(runs[0].metric("mae"), Some(0.4));

        let artifact = runs[0].artifact().unwrap();
        assert_eq!(tracker.load_artifact(artifact).unwrap(), b"{}");
    }

    #[test]
    fn test_layout_on_disk() {
        let dir = TempDir::new().unwrap();
        let mut tracker = FileTracker::open(dir.path()).unwrap();
        let exp = tracker.get_or_create_experiment("housing").unwrap();
        let run = tracker.create_run(exp.experiment_id(), "lr").unwrap();
        let artifact = tracker.log_artifact(run.run_id(), "model", b"abc").unwrap();

        assert!(dir.path().join(EXPERIMENTS_FILE).is_file());
        assert!(dir
            .path()
            .join(exp.experiment_id())
            .join(run.run_id())
            .join(RUN_FILE)
            .is_file());
        assert!(dir
            .path()
            .join(ARTIFACTS_DIR)
            .join(artifact.cas_hash())
            .is_file());
    }

    #[test]
    fn test_tampered_blob_is_artifact_error() {
        let dir = TempDir::new().unwrap();
        let mut tracker = FileTracker::open(dir.path()).unwrap();
        let exp = tracker.get_or_create_experiment("housing").unwrap();
        let run = tracker.create_run(exp.experiment_id(), "lr").unwrap();
        let artifact = tracker.log_artifact(run.run_id(), "model", b"abc").unwrap();

        fs::write(tracker.blob_path(artifact.cas_hash()), b"abd").unwrap();
        assert!(matches!(
            tracker.load_artifact(&artifact),
            Err(Error::Artifact(_))
        ));
    }

    #[test]
    fn test_path_like_run_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut tracker = FileTracker::open(dir.path()).unwrap();
        tracker.get_or_create_experiment("housing").unwrap();
        assert!(matches!(
            tracker.log_metric("../escape", "mae", 1.0),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_closed_run_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let mut tracker = FileTracker::open(dir.path()).unwrap();
        let exp = tracker.get_or_create_experiment("housing").unwrap();
        let run = tracker.create_run(exp.experiment_id(), "lr").unwrap();
        tracker.complete_run(run.run_id(), RunStatus::Failed).unwrap();

        assert!(matches!(
            tracker.log_metric(run.run_id(), "mae", 1.0),
            Err(Error::State(_))
        ));
    }
}
