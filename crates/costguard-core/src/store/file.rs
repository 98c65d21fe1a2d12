//! Directory-backed prediction store, one JSON object per key.

use super::{PredictionArtifact, PredictionStore, PutOutcome, StoreError, resolve_put};
use crate::analytics::Prediction;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Stores each artifact as `<dir>/<key>`.
///
/// Writes go through a temporary file and an atomic rename, so readers never
/// see a partial artifact. The newer-timestamp check and the rename are not
/// atomic across processes: two overlapping writers can still race in that
/// window, and the later rename wins.
#[derive(Debug, Clone)]
pub struct FilePredictionStore {
    dir: PathBuf,
}

impl FilePredictionStore {
    /// Opens a store rooted at `dir`, creating the directory.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Write(format!("failed to create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\'])
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }

    fn read_artifact(&self, key: &str) -> Result<PredictionArtifact, StoreError> {
        let path = self.path_for(key)?;
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => StoreError::Read(format!("{}: {}", path.display(), e)),
        })?;
        PredictionArtifact::from_json(key, &content)
    }
}

impl PredictionStore for FilePredictionStore {
    fn put(&self, key: &str, prediction: &Prediction) -> Result<PutOutcome, StoreError> {
        let path = self.path_for(key)?;

        let existing = match self.read_artifact(key) {
            Ok(artifact) => Some(artifact.generated_at),
            Err(StoreError::NotFound(_)) => None,
            Err(StoreError::Malformed { reason, .. }) => {
                warn!(key, reason = %reason, "Replacing malformed prediction artifact");
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(outcome) = resolve_put(existing, prediction.generated_at) {
            info!(key, "Newer prediction already stored; skipping write");
            return Ok(outcome);
        }

        let json = PredictionArtifact::from(prediction).to_json()?;
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| StoreError::Write(format!("failed to create temp file: {}", e)))?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StoreError::Write(format!("failed to write temp file: {}", e)))?;
        tmp.persist(&path)
            .map_err(|e| StoreError::Write(format!("failed to replace {}: {}", path.display(), e)))?;

        debug!(key, path = %path.display(), "Stored prediction artifact");
        Ok(PutOutcome::Written)
    }

    fn get(&self, key: &str) -> Result<Prediction, StoreError> {
        self.read_artifact(key).map(Prediction::from)
    }
}
