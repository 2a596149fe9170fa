//! Manager configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use vigil_providers::ProviderSettings;

/// Persisted sessions older than this are dropped on load
pub const STALENESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Tick of the X11 idle-reset loop
pub const IDLE_RESET_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound for bus calls and helper processes
pub const CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the session state file
    pub state_dir: PathBuf,
    /// Name reported to the OS as the inhibiting application
    pub app_name: String,
    pub staleness_window: Duration,
    pub idle_reset_interval: Duration,
    pub call_timeout: Duration,
}

impl Config {
    pub fn new(state_dir: PathBuf) -> Self {
        Self {
            state_dir,
            app_name: "vigil".to_string(),
            staleness_window: STALENESS_WINDOW,
            idle_reset_interval: IDLE_RESET_INTERVAL,
            call_timeout: CALL_TIMEOUT,
        }
    }

    /// Per-user state directory
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|d| d.join("vigil"))
            .unwrap_or_else(|| PathBuf::from(".vigil"))
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            app_name: self.app_name.clone(),
            call_timeout: self.call_timeout,
            idle_reset_interval: self.idle_reset_interval,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::state_dir())
    }
}
