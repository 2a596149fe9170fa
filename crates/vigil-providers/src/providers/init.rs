//! systemd-logind inhibition through a blocking `systemd-inhibit` child

use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use vigil_detect::Environment;

use crate::cookie::Cookie;
use crate::error::ProviderError;
use crate::exec;
use crate::provider::{Provider, ProviderSettings};
use crate::Result;

pub const NAME: &str = "init-manager";
const PRIORITY: i32 = 80;
const SYSTEMD_INHIBIT: &str = "systemd-inhibit";

/// A child that dies this quickly never held the lock
const EARLY_EXIT_GRACE: Duration = Duration::from_millis(150);

struct ChildHold {
    pid: u32,
    cancel: CancellationToken,
}

/// Holds a logind inhibitor lock for as long as a `systemd-inhibit` child
/// lives.
///
/// A watcher task owns the child: it kills it on release and clears the hold
/// when the child exits on its own.
pub struct InitProvider {
    has_init_inhibitor: bool,
    program: &'static str,
    runtime: Handle,
    settings: ProviderSettings,
    /// Held by `acquire` through the early-exit check
    acquiring: Mutex<()>,
    state: Arc<Mutex<Option<ChildHold>>>,
}

impl InitProvider {
    pub fn new(environment: &Environment, runtime: Handle, settings: &ProviderSettings) -> Self {
        Self {
            has_init_inhibitor: environment.has_init_inhibitor,
            program: SYSTEMD_INHIBIT,
            runtime,
            settings: settings.clone(),
            acquiring: Mutex::new(()),
            state: Arc::new(Mutex::new(None)),
        }
    }

    fn spawn_holder(&self, reason: &str) -> std::io::Result<ChildHold> {
        let program = exec::find_binary(self.program).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found in PATH", self.program),
            )
        })?;

        // tokio needs a runtime context to register the child
        let _guard = self.runtime.enter();
        let mut child = tokio::process::Command::new(program)
            .arg("--what=idle:sleep")
            .arg(format!("--who={}", self.settings.app_name))
            .arg(format!("--why={}", reason))
            .arg("--mode=block")
            .args(["sleep", "infinity"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child
            .id()
            .ok_or_else(|| std::io::Error::other("systemd-inhibit exited immediately"))?;
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let state = Arc::clone(&self.state);

        self.runtime.spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    {
                        let mut hold = state.lock();
                        if hold.as_ref().is_some_and(|h| h.pid == pid) {
                            *hold = None;
                        }
                    }
                    match status {
                        Ok(status) => tracing::warn!(pid, %status, "systemd-inhibit exited on its own"),
                        Err(e) => tracing::warn!(pid, error = %e, "Lost track of systemd-inhibit"),
                    }
                }
                () = token.cancelled() => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(pid, error = %e, "Failed to stop systemd-inhibit");
                    }
                }
            }
        });

        Ok(ChildHold { pid, cancel })
    }
}

impl Provider for InitProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn available(&self) -> bool {
        self.has_init_inhibitor && exec::find_binary(self.program).is_some()
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn acquire(&self, reason: &str) -> Result<Cookie> {
        // Later callers wait until the hold is confirmed or gone
        let _acquiring = self.acquiring.lock();

        let pid = {
            let mut state = self.state.lock();
            if let Some(hold) = state.as_ref() {
                return Ok(Cookie::Process { pid: hold.pid });
            }

            let hold = self
                .spawn_holder(reason)
                .map_err(|e| ProviderError::acquire(NAME, e))?;
            let pid = hold.pid;
            *state = Some(hold);
            pid
        };

        // Rejected requests (no logind, policy denial) exit right away
        std::thread::sleep(EARLY_EXIT_GRACE);
        if !self.state.lock().as_ref().is_some_and(|h| h.pid == pid) {
            return Err(ProviderError::acquire(
                NAME,
                "systemd-inhibit exited before the lock was held",
            ));
        }

        tracing::info!(pid, "Inhibited via systemd-inhibit");
        Ok(Cookie::Process { pid })
    }

    fn release(&self, cookie: &Cookie) -> Result<()> {
        let Cookie::Process { pid } = cookie else {
            return Err(ProviderError::CookieMismatch {
                provider: NAME.to_string(),
            });
        };

        let mut state = self.state.lock();
        match state.take() {
            Some(hold) if hold.pid == *pid => {
                hold.cancel.cancel();
                tracing::info!(pid, "Released systemd-inhibit");
                Ok(())
            }
            other => {
                *state = other;
                Err(ProviderError::release(
                    NAME,
                    format!("no systemd-inhibit with pid {} is held", pid),
                ))
            }
        }
    }

    fn status(&self) -> Result<bool> {
        Ok(self.state.lock().is_some())
    }
}

impl Drop for InitProvider {
    fn drop(&mut self) {
        if let Some(hold) = self.state.lock().take() {
            hold.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_unavailable_without_systemd() {
        let rt = runtime();
        let provider = InitProvider::new(
            &Environment::default(),
            rt.handle().clone(),
            &ProviderSettings::default(),
        );
        assert!(!provider.available());
        assert!(!provider.status().unwrap());
    }

    #[test]
    fn test_release_unknown_pid() {
        let rt = runtime();
        let provider = InitProvider::new(
            &Environment::default(),
            rt.handle().clone(),
            &ProviderSettings::default(),
        );

        assert!(matches!(
            provider.release(&Cookie::Process { pid: 4242 }),
            Err(ProviderError::ReleaseFailed { .. })
        ));
        assert!(matches!(
            provider.release(&Cookie::Inert(1)),
            Err(ProviderError::CookieMismatch { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_concurrent_acquire_never_shares_dead_holder() {
        if exec::find_binary("false").is_none() {
            return;
        }
        let rt = runtime();
        let mut provider = InitProvider::new(
            &Environment::default(),
            rt.handle().clone(),
            &ProviderSettings::default(),
        );
        // Exits at once, like a rejected inhibit request
        provider.program = "false";
        let provider = Arc::new(provider);

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || provider.acquire("build"))
            })
            .collect();

        for worker in workers {
            assert!(matches!(
                worker.join().unwrap(),
                Err(ProviderError::AcquireFailed { .. })
            ));
        }
        assert!(!provider.status().unwrap());
    }
}
