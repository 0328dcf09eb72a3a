//! Scoped run handle: write-once params, append-only metrics, artifacts,
//! and a guaranteed terminal state on every exit path.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;

use tracing::warn;

use crate::artifacts::{self, ArtifactLocation};
use crate::client::TrackingClient;
use crate::error::{Result, TrackError};
use crate::models::{Run, RunStatus};

/// An open run.
///
/// Obtained from [`TrackingClient::start_run`]. Dropping the handle without
/// an explicit close transitions the run to `FINISHED`, or `FAILED` when
/// the thread is panicking, so a started run is never left `RUNNING`.
#[derive(Debug)]
pub struct ActiveRun<'c> {
    client: &'c TrackingClient,
    run: Run,
    params: HashMap<String, String>,
    uploaded: HashSet<String>,
    closed: bool,
}

impl<'c> ActiveRun<'c> {
    pub(crate) fn new(client: &'c TrackingClient, run: Run) -> Self {
        Self {
            client,
            run,
            params: HashMap::new(),
            uploaded: HashSet::new(),
            closed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.run.id
    }

    pub fn info(&self) -> &Run {
        &self.run
    }

    pub fn artifact_uri(&self) -> &str {
        &self.run.artifact_uri
    }

    /// Log a write-once parameter. Re-logging the identical value is a
    /// no-op; a different value fails with
    /// [`TrackError::DuplicateParam`].
    pub fn log_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        let value = value.into();

        if let Some(existing) = self.params.get(&key) {
            if *existing == value {
                return Ok(());
            }
            return Err(TrackError::DuplicateParam {
                existing: existing.clone(),
                key,
            });
        }

        self.client.log_param(&self.run.id, &key, &value)?;
        self.params.insert(key, value);
        Ok(())
    }

    pub fn log_params<K, V>(&mut self, params: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in params {
            self.log_param(key, value)?;
        }
        Ok(())
    }

    /// Append one metric point. Always succeeds while the run is open.
    pub fn log_metric(&self, key: &str, value: f64, step: Option<u64>) -> Result<()> {
        self.client.log_metric(&self.run.id, key, value, step)
    }

    /// Upload a single file under the run's artifact root, keyed by its
    /// file name.
    pub fn log_artifact(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                TrackError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path has no file name: {}", path.display()),
                ))
            })?
            .to_string();
        self.log_artifact_as(&file_name, path)
    }

    /// Upload a single file under the run's artifact root, keyed by `rel`.
    pub fn log_artifact_as(&mut self, rel: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let meta = fs::metadata(path)?;
        if meta.is_dir() {
            return Err(TrackError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory, use log_artifacts", path.display()),
            )));
        }

        let location = ArtifactLocation::parse(&self.run.artifact_uri)?;
        self.reserve_key(location.key_for(rel))?;
        self.client.store().upload_file(&location, rel, path)
    }

    /// Recursively upload a directory tree, preserving relative paths
    /// under the run's artifact root.
    pub fn log_artifacts(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let location = ArtifactLocation::parse(&self.run.artifact_uri)?;
        let files = artifacts::collect_files(dir.as_ref())?;
        for (_, rel) in &files {
            self.reserve_key(location.key_for(rel))?;
        }
        for (path, rel) in files {
            self.client.store().upload_file(&location, &rel, &path)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Result<Run> {
        self.end(RunStatus::Finished)
    }

    pub fn fail(self) -> Result<Run> {
        self.end(RunStatus::Failed)
    }

    /// Transition the run to a terminal state, consuming the handle.
    pub fn end(mut self, status: RunStatus) -> Result<Run> {
        self.closed = true;
        self.client.end_run(&self.run.id, status)
    }

    // Artifacts are immutable once uploaded: a key written through this
    // handle cannot be written again.
    fn reserve_key(&mut self, key: String) -> Result<()> {
        if !self.uploaded.insert(key.clone()) {
            return Err(TrackError::Upload {
                key,
                reason: "artifact already uploaded for this run".to_string(),
            });
        }
        Ok(())
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let status = if std::thread::panicking() {
            RunStatus::Failed
        } else {
            RunStatus::Finished
        };
        if let Err(e) = self.client.end_run(&self.run.id, status) {
            warn!(run = %self.run.id, error = %e, "failed to end run on drop");
        }
    }
}
