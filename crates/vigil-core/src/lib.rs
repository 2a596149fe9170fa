//! Vigil Core
//!
//! Entry point for keeping the session awake. [`Manager`] picks the best
//! inhibition backend at runtime, tracks concurrent (optionally timed)
//! sessions, and persists them so bookkeeping survives restarts.

mod config;
mod error;
mod manager;

pub use config::{Config, CALL_TIMEOUT, IDLE_RESET_INTERVAL, STALENESS_WINDOW};
pub use error::CoreError;
pub use manager::{Manager, Status, DEFAULT_REASON};

// Re-export building blocks
pub use vigil_detect::{detect, DisplayServer, Environment};
pub use vigil_providers::{
    Cookie, Provider, ProviderError, ProviderSettings, ProviderStatus, Registry,
};
pub use vigil_session::{Scheduler, Session, SessionError, SessionManager};
pub use vigil_storage::{StateStore, StorageError, STATE_FILE_NAME};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
