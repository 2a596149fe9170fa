//! Scriptable provider for tests

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::cookie::Cookie;
use crate::error::ProviderError;
use crate::provider::Provider;
use crate::Result;

/// In-memory provider with switchable availability and failures.
pub struct MockProvider {
    name: String,
    priority: i32,
    available: AtomicBool,
    fail_acquire: AtomicBool,
    fail_release: AtomicBool,
    next_cookie: AtomicU64,
    active: Mutex<Option<Cookie>>,
    acquire_calls: AtomicUsize,
    release_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            available: AtomicBool::new(true),
            fail_acquire: AtomicBool::new(false),
            fail_release: AtomicBool::new(false),
            next_cookie: AtomicU64::new(1),
            active: Mutex::new(None),
            acquire_calls: AtomicUsize::new(0),
            release_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_fail_acquire(&self, fail: bool) {
        self.fail_acquire.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }

    /// Number of `acquire` calls that reached the OS-level step
    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }
}

impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn acquire(&self, _reason: &str) -> Result<Cookie> {
        let mut active = self.active.lock();
        if let Some(cookie) = active.as_ref() {
            return Ok(cookie.clone());
        }

        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(ProviderError::acquire(&self.name, "mock acquire failure"));
        }

        let cookie = Cookie::Inert(self.next_cookie.fetch_add(1, Ordering::SeqCst));
        *active = Some(cookie.clone());
        Ok(cookie)
    }

    fn release(&self, cookie: &Cookie) -> Result<()> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);

        let mut active = self.active.lock();
        if active.as_ref() != Some(cookie) {
            return Err(ProviderError::CookieMismatch {
                provider: self.name.clone(),
            });
        }
        // The hold is gone either way
        *active = None;

        if self.fail_release.load(Ordering::SeqCst) {
            return Err(ProviderError::release(&self.name, "mock release failure"));
        }
        Ok(())
    }

    fn status(&self) -> Result<bool> {
        Ok(self.is_active())
    }
}
