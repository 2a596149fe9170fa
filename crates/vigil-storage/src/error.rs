//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt state file: {0}")]
    CorruptState(String),

    #[error("Unsupported state version: {0}")]
    UnsupportedVersion(String),

    #[error("Failed to persist state: {0}")]
    PersistFailed(String),
}
