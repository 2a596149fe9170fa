//! Provider contract

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use vigil_detect::Environment;

use crate::cookie::Cookie;
use crate::providers::{DisplayProvider, FallbackProvider, InitProvider, SessionBusProvider};
use crate::Result;

/// One backend able to suppress idle, screen lock or suspend.
///
/// A provider holds at most one hold at a time. A second `acquire` while a
/// hold is active returns the existing cookie instead of creating another.
pub trait Provider: Send + Sync {
    /// Stable, unique registry key
    fn name(&self) -> &str;

    /// Cheap runtime probe. Returns `false` instead of failing.
    fn available(&self) -> bool;

    /// Static ordering weight, higher wins
    fn priority(&self) -> i32;

    fn acquire(&self, reason: &str) -> Result<Cookie>;

    fn release(&self, cookie: &Cookie) -> Result<()>;

    /// Whether a hold is currently active
    fn status(&self) -> Result<bool>;
}

/// Point-in-time view of a registered provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub name: String,
    pub priority: i32,
    pub available: bool,
    pub active: bool,
}

impl ProviderStatus {
    pub fn of(provider: &dyn Provider) -> Self {
        let active = match provider.status() {
            Ok(active) => active,
            Err(e) => {
                tracing::debug!(provider = %provider.name(), error = %e, "Status query failed");
                false
            }
        };

        Self {
            name: provider.name().to_string(),
            priority: provider.priority(),
            available: provider.available(),
            active,
        }
    }
}

/// Knobs shared by the built-in providers.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Reported to the OS as the application holding the inhibit
    pub app_name: String,
    /// Upper bound for every bus call and helper process
    pub call_timeout: Duration,
    /// Tick of the X11 idle-reset loop
    pub idle_reset_interval: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            app_name: "vigil".to_string(),
            call_timeout: Duration::from_secs(5),
            idle_reset_interval: Duration::from_secs(30),
        }
    }
}

/// The built-in providers for `environment`.
///
/// `runtime` drives background work: the idle-reset ticker and the
/// subprocess watcher.
pub fn default_providers(
    environment: &Environment,
    runtime: Handle,
    settings: &ProviderSettings,
) -> Vec<Arc<dyn Provider>> {
    vec![
        Arc::new(SessionBusProvider::new(environment, settings)),
        Arc::new(InitProvider::new(environment, runtime.clone(), settings)),
        Arc::new(DisplayProvider::new(environment, runtime, settings)),
        Arc::new(FallbackProvider::new()),
    ]
}
