//! Desktop session-bus inhibition

use parking_lot::Mutex;
use zbus::blocking::Connection;

use vigil_detect::Environment;

use crate::cookie::Cookie;
use crate::error::ProviderError;
use crate::provider::{Provider, ProviderSettings};
use crate::providers::BusInterface;
use crate::Result;

pub const NAME: &str = "session-bus";
const PRIORITY: i32 = 100;

#[derive(Default)]
struct BusState {
    connection: Option<Connection>,
    active: Option<Cookie>,
}

/// Calls the desktop's own inhibit API over the session bus.
///
/// Candidates are tried in rank order; the interface that produced the cookie
/// is recorded in it so release goes to the same service.
pub struct SessionBusProvider {
    has_session_bus: bool,
    candidates: Vec<BusInterface>,
    settings: ProviderSettings,
    state: Mutex<BusState>,
}

impl SessionBusProvider {
    pub fn new(environment: &Environment, settings: &ProviderSettings) -> Self {
        Self {
            has_session_bus: environment.has_session_bus,
            candidates: BusInterface::ranked_for(&environment.desktop_env),
            settings: settings.clone(),
            state: Mutex::new(BusState::default()),
        }
    }

    pub fn candidates(&self) -> &[BusInterface] {
        &self.candidates
    }

    fn connection(&self, state: &mut BusState) -> zbus::Result<Connection> {
        if let Some(conn) = state.connection.as_ref() {
            return Ok(conn.clone());
        }

        let conn = zbus::blocking::connection::Builder::session()?
            .method_timeout(self.settings.call_timeout)
            .build()?;
        state.connection = Some(conn.clone());
        Ok(conn)
    }
}

impl Provider for SessionBusProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn available(&self) -> bool {
        if !self.has_session_bus {
            return false;
        }

        let mut state = self.state.lock();
        let conn = match self.connection(&mut state) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(error = %e, "Session bus unreachable");
                return false;
            }
        };

        self.candidates.iter().any(|candidate| candidate.probe(&conn))
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn acquire(&self, reason: &str) -> Result<Cookie> {
        let mut state = self.state.lock();
        if let Some(cookie) = state.active.as_ref() {
            return Ok(cookie.clone());
        }

        let conn = self
            .connection(&mut state)
            .map_err(|e| ProviderError::acquire(NAME, e))?;

        let mut failures = Vec::new();
        for interface in &self.candidates {
            match interface.inhibit(&conn, &self.settings.app_name, reason) {
                Ok(token) => {
                    let cookie = Cookie::Bus {
                        interface: *interface,
                        token,
                    };
                    tracing::info!(interface = %interface.as_str(), cookie = %cookie, "Inhibited via session bus");
                    state.active = Some(cookie.clone());
                    return Ok(cookie);
                }
                Err(e) => {
                    tracing::debug!(interface = %interface.as_str(), error = %e, "Inhibit call failed");
                    failures.push(format!("{}: {}", interface.as_str(), e));
                }
            }
        }

        // Reconnect next time in case the bus went away
        state.connection = None;
        Err(ProviderError::acquire(NAME, failures.join("; ")))
    }

    fn release(&self, cookie: &Cookie) -> Result<()> {
        let Cookie::Bus { interface, token } = cookie else {
            return Err(ProviderError::CookieMismatch {
                provider: NAME.to_string(),
            });
        };

        let mut state = self.state.lock();
        if state.active.as_ref() != Some(cookie) {
            return Err(ProviderError::release(NAME, "no matching inhibit is active"));
        }
        // The hold is considered gone even if the call fails
        state.active = None;

        let conn = self
            .connection(&mut state)
            .map_err(|e| ProviderError::release(NAME, e))?;
        interface
            .uninhibit(&conn, token)
            .map_err(|e| ProviderError::release(NAME, e))?;

        tracing::info!(interface = %interface.as_str(), "Released session bus inhibit");
        Ok(())
    }

    fn status(&self) -> Result<bool> {
        Ok(self.state.lock().active.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(has_session_bus: bool, desktop: &str) -> SessionBusProvider {
        let environment = Environment {
            has_session_bus,
            desktop_env: desktop.to_string(),
            ..Environment::default()
        };
        SessionBusProvider::new(&environment, &ProviderSettings::default())
    }

    #[test]
    fn test_unavailable_without_session_bus() {
        let provider = provider(false, "gnome");
        assert!(!provider.available());
        assert!(!provider.status().unwrap());
    }

    #[test]
    fn test_candidates_follow_desktop() {
        let provider = provider(true, "xfce");
        assert_eq!(provider.candidates()[0], BusInterface::PowerManagement);
    }

    #[test]
    fn test_release_rejects_foreign_cookie() {
        let provider = provider(false, "gnome");
        assert_eq!(
            provider.release(&Cookie::Inert(1)).unwrap_err(),
            ProviderError::CookieMismatch {
                provider: NAME.to_string()
            }
        );
    }

    #[test]
    fn test_release_without_hold() {
        let provider = provider(false, "gnome");
        let cookie = Cookie::Bus {
            interface: BusInterface::GnomeSessionManager,
            token: crate::BusToken::Id(7),
        };
        assert!(matches!(
            provider.release(&cookie),
            Err(ProviderError::ReleaseFailed { .. })
        ));
    }
}
