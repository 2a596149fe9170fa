//! Vigil Providers
//!
//! Each provider implements one way of keeping the session awake behind the
//! [`Provider`] contract:
//! - Session bus: desktop inhibit interfaces (GNOME, MATE, KDE, XFCE, portal)
//! - Display server: X11 screensaver / DPMS control or an idle-reset loop
//! - Init manager: a blocking `systemd-inhibit` subprocess
//! - Fallback: always available, does nothing at the OS level
//!
//! The [`Registry`] keeps providers ordered by priority and answers
//! availability queries at call time.

mod cookie;
mod error;
mod exec;
mod provider;
mod providers;
mod registry;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use cookie::{BusToken, Cookie, DisplayMethod};
pub use error::ProviderError;
pub use provider::{default_providers, Provider, ProviderSettings, ProviderStatus};
pub use providers::{
    BusInterface, DisplayProvider, FallbackProvider, InitProvider, SessionBusProvider,
};
pub use registry::Registry;

pub type Result<T> = std::result::Result<T, ProviderError>;
