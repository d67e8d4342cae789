//! Housing CSV over HTTP, cached on disk

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{validate_schema, DatasetSource, TARGET_COLUMN};
use crate::experiment::content_hash;
use crate::storage::Table;
use crate::{Error, Result};

/// Largest body accepted from the server
const MAX_DOWNLOAD_BYTES: u64 = 256 * 1024 * 1024;

/// Subdirectory of the cache dir holding downloaded bodies
const CACHE_SUBDIR: &str = "downloads";

const USER_AGENT: &str = concat!("housing-mlops/", env!("CARGO_PKG_VERSION"));

/// Downloads a CSV with the housing schema, once per cache directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCsvSource {
    url: String,
    target_column: String,
}

impl HttpCsvSource {
    /// Source for the CSV at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            target_column: TARGET_COLUMN.to_string(),
        }
    }

    /// Expect a target column other than `MedHouseVal`.
    #[must_use]
    pub fn with_target_column(mut self, target_column: impl Into<String>) -> Self {
        self.target_column = target_column.into();
        self
    }

    /// Cache location for this URL under `cache_dir`.
    #[must_use]
    pub fn cache_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir
            .join(CACHE_SUBDIR)
            .join(format!("{}.csv", content_hash(self.url.as_bytes())))
    }

    fn download(&self, path: &Path) -> Result<()> {
        let fetch_error = |e: reqwest::Error| Error::Fetch(format!("{}: {e}", self.url));

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(fetch_error)?;
        let response = client
            .get(&self.url)
            .send()
            .map_err(fetch_error)?
            .error_for_status()
            .map_err(fetch_error)?;

        if let Some(len) = response.content_length() {
            if len > MAX_DOWNLOAD_BYTES {
                return Err(Error::Fetch(format!(
                    "{}: body of {len} bytes exceeds the {MAX_DOWNLOAD_BYTES} byte limit",
                    self.url
                )));
            }
        }
        let body = response.bytes().map_err(fetch_error)?;
        if body.len() as u64 > MAX_DOWNLOAD_BYTES {
            return Err(Error::Fetch(format!(
                "{}: body exceeds the {MAX_DOWNLOAD_BYTES} byte limit",
                self.url
            )));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("part");
        fs::write(&tmp, &body)?;
        fs::rename(&tmp, path)?;
        info!(url = %self.url, bytes = body.len(), "dataset downloaded");
        Ok(())
    }
}

impl DatasetSource for HttpCsvSource {
    fn describe(&self) -> String {
        format!("HTTP CSV at {}", self.url)
    }

    fn fetch(&self, cache_dir: &Path) -> Result<Table> {
        let path = self.cache_path(cache_dir);
        if path.is_file() {
            debug!(path = %path.display(), "using cached download");
        } else {
            self.download(&path)?;
        }

        let table = Table::read_csv(&path)?;
        validate_schema(&table, &self.target_column)?;
        Ok(table)
    }
}
