//! Session error types

use thiserror::Error;
use vigil_providers::ProviderError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{}", describe_failures(.0))]
    ReleaseFailures(Vec<ProviderError>),
}

fn describe_failures(failures: &[ProviderError]) -> String {
    let details: Vec<String> = failures.iter().map(|e| e.to_string()).collect();
    format!(
        "{} release(s) failed: {}",
        failures.len(),
        details.join("; ")
    )
}
