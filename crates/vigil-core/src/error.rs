//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Session(#[from] vigil_session::SessionError),

    #[error(transparent)]
    Provider(#[from] vigil_providers::ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no active sessions")]
    NoActiveSessions,
}
