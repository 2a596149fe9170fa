//! Provider error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider not found: {0}")]
    NotFound(String),

    #[error("Provider not available: {0}")]
    Unavailable(String),

    #[error("No inhibit providers available")]
    NoProvidersAvailable,

    #[error("Provider already registered: {0}")]
    AlreadyRegistered(String),

    #[error("{provider}: failed to inhibit: {reason}")]
    AcquireFailed { provider: String, reason: String },

    #[error("{provider}: failed to release inhibit: {reason}")]
    ReleaseFailed { provider: String, reason: String },

    #[error("{provider}: cookie was not issued by this provider")]
    CookieMismatch { provider: String },
}

impl ProviderError {
    pub fn acquire(provider: &str, reason: impl ToString) -> Self {
        ProviderError::AcquireFailed {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn release(provider: &str, reason: impl ToString) -> Self {
        ProviderError::ReleaseFailed {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }
}
