//! Session Manager
//!
//! Lifecycle of a session:
//! ```text
//! Created (provider granted a hold)
//!   ↓ inserted, timer armed when bounded
//! Active
//!   ↓ remove_session / remove_all_sessions     ↓ timer fired
//! Stopped                                      Expired
//! ```
//! Terminal sessions are dropped from the table, not archived.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use vigil_providers::{Cookie, Provider, ProviderError, Registry};

use crate::error::SessionError;
use crate::session::Session;
use crate::timer::{Expire, Scheduler, TimerHandle};
use crate::Result;

/// Called after a session expired and its hold was released.
pub type ExpiryHook = Arc<dyn Fn(&Session, &SessionManager) + Send + Sync>;

struct Entry {
    session: Session,
    /// `None` for sessions restored from disk
    cookie: Option<Cookie>,
    timer: Option<TimerHandle>,
}

/// A hold to give back once the entry is out of the table.
#[derive(PartialEq)]
struct PendingRelease {
    provider_name: String,
    cookie: Cookie,
}

struct Inner {
    registry: Arc<Registry>,
    scheduler: Scheduler,
    sessions: RwLock<HashMap<String, Entry>>,
    /// Per provider: held from taking a hold to recording it, and from
    /// dropping the last holder to releasing it
    holds: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    expiry_hook: RwLock<Option<ExpiryHook>>,
    weak_self: Weak<Inner>,
}

impl Inner {
    fn hold_lock(&self, provider_name: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.holds
                .lock()
                .entry(provider_name.to_string())
                .or_default(),
        )
    }

    fn provider_of(&self, session_id: &str) -> Option<String> {
        self.sessions
            .read()
            .get(session_id)
            .map(|entry| entry.session.provider_name.clone())
    }

    /// Detach `session_id` and release its hold if it was the last one,
    /// with no acquire on the same provider in between.
    fn stop(&self, session_id: &str) -> Option<(Session, Option<ProviderError>)> {
        let provider_name = self.provider_of(session_id)?;
        let hold_lock = self.hold_lock(&provider_name);
        let _hold = hold_lock.lock();

        let (session, pending) = Inner::detach(&mut self.sessions.write(), session_id)?;
        let failure = pending.and_then(|pending| self.release(&pending).err());
        Some((session, failure))
    }

    fn expiry_target(&self) -> Weak<dyn Expire> {
        let weak: Weak<Inner> = self.weak_self.clone();
        weak
    }

    /// Remove `session_id` from `sessions`, cancelling its timer.
    ///
    /// The hold is only released once no other session shares it.
    fn detach(
        sessions: &mut HashMap<String, Entry>,
        session_id: &str,
    ) -> Option<(Session, Option<PendingRelease>)> {
        let entry = sessions.remove(session_id)?;
        if let Some(timer) = entry.timer {
            timer.cancel();
        }

        let pending = entry.cookie.and_then(|cookie| {
            let shared = sessions.values().any(|other| {
                other.session.provider_name == entry.session.provider_name
                    && other.cookie.as_ref() == Some(&cookie)
            });
            (!shared).then(|| PendingRelease {
                provider_name: entry.session.provider_name.clone(),
                cookie,
            })
        });

        Some((entry.session, pending))
    }

    fn release(&self, pending: &PendingRelease) -> std::result::Result<(), ProviderError> {
        let provider = self.registry.get(&pending.provider_name)?;
        provider.release(&pending.cookie)?;

        tracing::debug!(
            provider = %pending.provider_name,
            cookie = %pending.cookie,
            "Released hold"
        );
        Ok(())
    }

    fn schedule(&self, after: Duration, session_id: &str) -> TimerHandle {
        self.scheduler
            .schedule_expiry(after, self.expiry_target(), session_id.to_string())
    }
}

impl Expire for Inner {
    fn expire(&self, session_id: &str) {
        // An explicit stop got there first
        let Some((session, failure)) = self.stop(session_id) else {
            tracing::debug!(session_id = %session_id, "Expired session already removed");
            return;
        };

        if let Some(e) = failure {
            tracing::warn!(
                session_id = %session.id,
                provider = %session.provider_name,
                error = %e,
                "Failed to release expired session"
            );
        }

        tracing::info!(
            session_id = %session.id,
            provider = %session.provider_name,
            reason = %session.reason,
            "Session expired"
        );

        let hook = self.expiry_hook.read().clone();
        if let (Some(hook), Some(inner)) = (hook, self.weak_self.upgrade()) {
            hook(&session, &SessionManager { inner });
        }
    }
}

pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(registry: Arc<Registry>, scheduler: Scheduler) -> Self {
        let inner = Arc::new_cyclic(|weak_self| Inner {
            registry,
            scheduler,
            sessions: RwLock::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            expiry_hook: RwLock::new(None),
            weak_self: weak_self.clone(),
        });

        Self { inner }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn set_expiry_hook(&self, hook: ExpiryHook) {
        *self.inner.expiry_hook.write() = Some(hook);
    }

    fn resolve_provider(&self, provider_name: Option<&str>) -> Result<Arc<dyn Provider>> {
        let registry = &self.inner.registry;

        match provider_name.filter(|name| !name.is_empty()) {
            Some(name) => {
                let provider = registry.get(name)?;
                if !provider.available() {
                    return Err(ProviderError::Unavailable(name.to_string()).into());
                }
                Ok(provider)
            }
            None => Ok(registry.get_best()?),
        }
    }

    /// Acquire a hold and register a session for it.
    ///
    /// Without a provider name the best available provider is used. A
    /// non-zero `duration` arms a timer that removes the session on its own.
    pub fn create_session(
        &self,
        provider_name: Option<&str>,
        reason: &str,
        duration: Duration,
    ) -> Result<Session> {
        let provider = self.resolve_provider(provider_name)?;

        let hold_lock = self.inner.hold_lock(provider.name());
        let _hold = hold_lock.lock();
        let cookie = provider.acquire(reason)?;

        let session = Session::new(provider.name().to_string(), reason.to_string(), duration);

        {
            let mut sessions = self.inner.sessions.write();
            let timer = session
                .is_bounded()
                .then(|| self.inner.schedule(duration, &session.id));

            sessions.insert(
                session.id.clone(),
                Entry {
                    session: session.clone(),
                    cookie: Some(cookie.clone()),
                    timer,
                },
            );
        }

        tracing::info!(
            session_id = %session.id,
            provider = %session.provider_name,
            cookie = %cookie,
            duration_ms = duration.as_millis() as u64,
            "Created session"
        );

        Ok(session)
    }

    /// Re-register a session loaded from disk.
    ///
    /// No hold is taken: the original one died with its process. Returns
    /// `false` when the session already expired or its id is taken.
    pub fn restore_session(&self, session: Session) -> bool {
        let remaining = session.remaining(Utc::now());
        if remaining.is_some_and(|left| left.is_zero()) {
            return false;
        }

        let mut sessions = self.inner.sessions.write();
        if sessions.contains_key(&session.id) {
            return false;
        }

        let timer = remaining.map(|left| self.inner.schedule(left, &session.id));

        tracing::info!(
            session_id = %session.id,
            provider = %session.provider_name,
            remaining_ms = remaining.map(|d| d.as_millis() as u64),
            "Restored session"
        );

        sessions.insert(
            session.id.clone(),
            Entry {
                session,
                cookie: None,
                timer,
            },
        );
        true
    }

    /// Stop a session and give its hold back.
    ///
    /// A release failure is returned, but the session is gone either way.
    pub fn remove_session(&self, session_id: &str) -> Result<()> {
        let (session, failure) = self
            .inner
            .stop(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        tracing::info!(
            session_id = %session.id,
            provider = %session.provider_name,
            "Stopped session"
        );

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Stop every session, attempting each release.
    ///
    /// The table ends up empty even when releases fail; failures are combined
    /// into one error.
    pub fn remove_all_sessions(&self) -> Result<()> {
        // Registry order, the same for every caller
        let hold_locks: Vec<Arc<Mutex<()>>> = self
            .inner
            .registry
            .names()
            .iter()
            .map(|name| self.inner.hold_lock(name))
            .collect();
        let _holds: Vec<_> = hold_locks.iter().map(|lock| lock.lock()).collect();

        let drained: Vec<Entry> = self
            .inner
            .sessions
            .write()
            .drain()
            .map(|(_, entry)| entry)
            .collect();

        let mut pending: Vec<PendingRelease> = Vec::new();
        for entry in drained {
            if let Some(timer) = entry.timer {
                timer.cancel();
            }
            if let Some(cookie) = entry.cookie {
                let release = PendingRelease {
                    provider_name: entry.session.provider_name.clone(),
                    cookie,
                };
                // Sessions sharing a hold release it once
                if !pending.contains(&release) {
                    pending.push(release);
                }
            }
            tracing::info!(session_id = %entry.session.id, "Stopped session");
        }

        let failures: Vec<ProviderError> = pending
            .iter()
            .filter_map(|release| self.inner.release(release).err())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SessionError::ReleaseFailures(failures))
        }
    }

    pub fn get_session(&self, session_id: &str) -> Result<Session> {
        self.inner
            .sessions
            .read()
            .get(session_id)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// All sessions, oldest first
    pub fn list_sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .inner
            .sessions
            .read()
            .values()
            .map(|entry| entry.session.clone())
            .collect();
        sessions.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        sessions
    }

    pub fn has_active_sessions(&self) -> bool {
        !self.inner.sessions.read().is_empty()
    }

    pub fn count(&self) -> usize {
        self.inner.sessions.read().len()
    }
}

impl Clone for SessionManager {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
