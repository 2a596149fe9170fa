//! Inert provider

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cookie::Cookie;
use crate::error::ProviderError;
use crate::provider::Provider;
use crate::Result;

pub const NAME: &str = "fallback";
const PRIORITY: i32 = 0;

/// Always available, touches nothing at the OS level.
///
/// Sessions still get bookkeeping and expiry, so there is always something to
/// select even on bare consoles.
pub struct FallbackProvider {
    next_cookie: AtomicU64,
    active: Mutex<Option<u64>>,
}

impl FallbackProvider {
    pub fn new() -> Self {
        Self {
            next_cookie: AtomicU64::new(1),
            active: Mutex::new(None),
        }
    }
}

impl Default for FallbackProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for FallbackProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn available(&self) -> bool {
        true
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn acquire(&self, reason: &str) -> Result<Cookie> {
        let mut active = self.active.lock();
        let id = match *active {
            Some(id) => id,
            None => {
                let id = self.next_cookie.fetch_add(1, Ordering::Relaxed);
                *active = Some(id);
                tracing::debug!(cookie = id, reason, "Fallback hold taken, no OS inhibit");
                id
            }
        };
        Ok(Cookie::Inert(id))
    }

    fn release(&self, cookie: &Cookie) -> Result<()> {
        let Cookie::Inert(id) = cookie else {
            return Err(ProviderError::CookieMismatch {
                provider: NAME.to_string(),
            });
        };

        let mut active = self.active.lock();
        if *active != Some(*id) {
            return Err(ProviderError::release(
                NAME,
                format!("cookie {} is not active", id),
            ));
        }
        *active = None;
        Ok(())
    }

    fn status(&self) -> Result<bool> {
        Ok(self.active.lock().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentrant_acquire_returns_same_cookie() {
        let provider = FallbackProvider::new();
        assert!(provider.available());

        let first = provider.acquire("one").unwrap();
        let second = provider.acquire("two").unwrap();
        assert_eq!(first, second);
        assert!(provider.status().unwrap());
    }

    #[test]
    fn test_new_hold_gets_new_cookie() {
        let provider = FallbackProvider::new();

        let first = provider.acquire("one").unwrap();
        provider.release(&first).unwrap();
        assert!(!provider.status().unwrap());

        let second = provider.acquire("two").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_release_stale_cookie() {
        let provider = FallbackProvider::new();
        let cookie = provider.acquire("one").unwrap();
        provider.release(&cookie).unwrap();

        assert!(matches!(
            provider.release(&cookie),
            Err(ProviderError::ReleaseFailed { .. })
        ));
        assert!(matches!(
            provider.release(&Cookie::Process { pid: 1 }),
            Err(ProviderError::CookieMismatch { .. })
        ));
    }
}
