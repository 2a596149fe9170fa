//! Manager façade
//!
//! Owns the provider registry, the live session table and the state file.
//! Every mutation rewrites the state file after the in-memory change is
//! done; a failed write is logged and never fails the caller.

use chrono::Utc;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use vigil_detect::Environment;
use vigil_providers::{default_providers, ProviderStatus, Registry};
use vigil_session::{Scheduler, Session, SessionError, SessionManager};
use vigil_storage::StateStore;

use crate::config::Config;
use crate::error::CoreError;
use crate::Result;

/// Used when `start` gets a blank reason
pub const DEFAULT_REASON: &str = "Inhibiting idle";

#[derive(Debug, Clone)]
pub struct Status {
    pub active: bool,
    pub sessions: Vec<Session>,
    /// Providers passing their probe right now, best first
    pub available_providers: Vec<String>,
}

/// Serializes state file writes so the last write carries the newest table.
#[derive(Clone)]
struct Persister {
    store: StateStore,
    write_lock: Arc<Mutex<()>>,
}

impl Persister {
    fn persist(&self, sessions: &SessionManager) {
        let _guard = self.write_lock.lock();
        if let Err(e) = self.store.save(sessions.list_sessions()) {
            tracing::warn!(
                path = %self.store.path().display(),
                error = %e,
                "Failed to persist sessions"
            );
        }
    }
}

pub struct Manager {
    config: Config,
    environment: Environment,
    sessions: SessionManager,
    persister: Persister,
}

impl Manager {
    /// Detect the environment, register the built-in providers and reload
    /// persisted sessions.
    pub fn new(config: Config) -> Result<Self> {
        let environment = vigil_detect::detect();
        let scheduler = Scheduler::new()?;

        let registry = Arc::new(Registry::new());
        for provider in default_providers(
            &environment,
            scheduler.handle().clone(),
            &config.provider_settings(),
        ) {
            registry.register(provider)?;
        }

        Ok(Self::with_registry(config, environment, registry, scheduler))
    }

    /// Build around an existing registry. Never fails: an unusable state file
    /// is discarded.
    pub fn with_registry(
        config: Config,
        environment: Environment,
        registry: Arc<Registry>,
        scheduler: Scheduler,
    ) -> Self {
        let sessions = SessionManager::new(registry, scheduler);
        let persister = Persister {
            store: StateStore::new(&config.state_dir),
            write_lock: Arc::new(Mutex::new(())),
        };

        let on_expire = persister.clone();
        sessions.set_expiry_hook(Arc::new(
            move |_session: &Session, sessions: &SessionManager| {
                on_expire.persist(sessions);
            },
        ));

        let manager = Self {
            config,
            environment,
            sessions,
            persister,
        };
        manager.load_state();

        tracing::info!(
            display_server = %manager.environment.display_server,
            desktop = %manager.environment.desktop_env,
            providers = ?manager.sessions.registry().names(),
            sessions = manager.sessions.count(),
            "Manager initialized"
        );

        manager
    }

    fn persist(&self) {
        self.persister.persist(&self.sessions);
    }

    /// Re-register persisted sessions that are neither expired nor stale.
    fn load_state(&self) {
        let store = &self.persister.store;

        let state = match store.load::<Session>() {
            Ok(Some(state)) => state,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(
                    path = %store.path().display(),
                    error = %e,
                    "Discarding unreadable state file"
                );
                if let Err(e) = store.remove() {
                    tracing::warn!(error = %e, "Failed to delete state file");
                }
                return;
            }
        };

        let now = Utc::now();
        let total = state.sessions.len();
        let mut restored = 0;

        for session in state.sessions {
            if session.is_expired(now) {
                tracing::debug!(session_id = %session.id, "Dropping expired session");
                continue;
            }
            if session.is_stale(now, self.config.staleness_window) {
                tracing::debug!(session_id = %session.id, "Dropping stale session");
                continue;
            }
            if self.sessions.restore_session(session) {
                restored += 1;
            }
        }

        tracing::info!(
            restored,
            discarded = total - restored,
            saved_at = %state.saved_at,
            "Loaded persisted sessions"
        );

        if restored != total {
            self.persist();
        }
    }

    /// Start keeping the system awake.
    ///
    /// `duration` of zero means until stopped. Without `provider_name` the
    /// best available provider is used.
    pub fn start(
        &self,
        reason: &str,
        duration: Duration,
        provider_name: Option<&str>,
    ) -> Result<Session> {
        let reason = if reason.trim().is_empty() {
            DEFAULT_REASON
        } else {
            reason
        };

        let session = self
            .sessions
            .create_session(provider_name, reason, duration)?;
        self.persist();

        Ok(session)
    }

    /// Stop one session, or all of them when `session_id` is empty.
    pub fn stop(&self, session_id: &str) -> Result<()> {
        if session_id.is_empty() {
            return self.stop_all();
        }

        let result = self.sessions.remove_session(session_id);
        if !matches!(result, Err(SessionError::NotFound(_))) {
            self.persist();
        }

        Ok(result?)
    }

    pub fn stop_all(&self) -> Result<()> {
        if !self.sessions.has_active_sessions() {
            return Err(CoreError::NoActiveSessions);
        }

        let result = self.sessions.remove_all_sessions();
        self.persist();

        Ok(result?)
    }

    pub fn get_status(&self) -> Status {
        let available_providers = self
            .sessions
            .registry()
            .get_available()
            .iter()
            .map(|p| p.name().to_string())
            .collect();

        Status {
            active: self.sessions.has_active_sessions(),
            sessions: self.sessions.list_sessions(),
            available_providers,
        }
    }

    pub fn list_sessions(&self) -> Vec<Session> {
        self.sessions.list_sessions()
    }

    pub fn get_session(&self, session_id: &str) -> Result<Session> {
        Ok(self.sessions.get_session(session_id)?)
    }

    pub fn get_environment(&self) -> &Environment {
        &self.environment
    }

    pub fn provider_statuses(&self) -> Vec<ProviderStatus> {
        self.sessions.registry().statuses()
    }

    /// Force-remove every session and delete the state file.
    ///
    /// Best effort: failures are logged, never returned.
    pub fn cleanup(&self) -> Result<()> {
        if let Err(e) = self.sessions.remove_all_sessions() {
            tracing::warn!(error = %e, "Cleanup could not release every hold");
        }

        let _guard = self.persister.write_lock.lock();
        match self.persister.store.remove() {
            Ok(true) => tracing::info!("Removed state file"),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "Cleanup could not delete state file"),
        }

        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state_path(&self) -> &Path {
        self.persister.store.path()
    }
}
