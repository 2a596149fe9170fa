//! State file access

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::StorageError;
use crate::state::{PersistedState, STATE_VERSION};
use crate::Result;

pub const STATE_FILE_NAME: &str = "idle-sessions.json";

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store for `<state_dir>/idle-sessions.json`
    pub fn new<P: AsRef<Path>>(state_dir: P) -> Self {
        Self {
            path: state_dir.as_ref().join(STATE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Replace the file with `sessions`, stamped with the current time.
    pub fn save<T: Serialize>(&self, sessions: Vec<T>) -> Result<()> {
        let count = sessions.len();
        let state = PersistedState::new(sessions);

        let dir = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| persist_failed("create state directory", e))?;

        let json =
            serde_json::to_vec_pretty(&state).map_err(|e| persist_failed("serialize state", e))?;

        // Same directory, so the rename stays on one filesystem
        let mut tmp =
            NamedTempFile::new_in(dir).map_err(|e| persist_failed("create temporary file", e))?;
        tmp.write_all(&json)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| persist_failed("write temporary file", e))?;
        tmp.persist(&self.path)
            .map_err(|e| persist_failed("rename into place", e.error))?;

        tracing::debug!(path = %self.path.display(), sessions = count, "Saved state");
        Ok(())
    }

    /// Read the file; `None` when there is none yet.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<PersistedState<T>>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state: PersistedState<T> = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::CorruptState(e.to_string()))?;

        if state.version != STATE_VERSION {
            return Err(StorageError::UnsupportedVersion(state.version));
        }

        Ok(Some(state))
    }

    /// Delete the file. Returns whether there was one.
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn persist_failed(step: &str, error: impl std::fmt::Display) -> StorageError {
    StorageError::PersistFailed(format!("{}: {}", step, error))
}
