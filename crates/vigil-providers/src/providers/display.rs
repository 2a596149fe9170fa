//! X11 idle suppression through `xset`

use parking_lot::Mutex;
use std::path::PathBuf;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use vigil_detect::{DisplayServer, Environment};

use crate::cookie::{Cookie, DisplayMethod};
use crate::error::ProviderError;
use crate::exec;
use crate::provider::{Provider, ProviderSettings};
use crate::Result;

pub const NAME: &str = "display-server";
const PRIORITY: i32 = 60;
const XSET: &str = "xset";

/// Methods in the order they are tried
const METHODS: [DisplayMethod; 3] = [
    DisplayMethod::ScreenSaverOff,
    DisplayMethod::DpmsOff,
    DisplayMethod::ResetLoop,
];

struct ResetLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ResetLoop {
    fn stop(self) {
        self.cancel.cancel();
        drop(self.task);
    }
}

struct DisplayHold {
    method: DisplayMethod,
    reset_loop: Option<ResetLoop>,
}

/// Keeps an X11 display awake.
///
/// Tries to switch off the screensaver, then DPMS, and finally falls back to
/// periodically resetting the idle timer. Release undoes only the method that
/// was activated.
pub struct DisplayProvider {
    is_x11: bool,
    runtime: Handle,
    settings: ProviderSettings,
    state: Mutex<Option<DisplayHold>>,
}

impl DisplayProvider {
    pub fn new(environment: &Environment, runtime: Handle, settings: &ProviderSettings) -> Self {
        Self {
            is_x11: environment.display_server == DisplayServer::X11,
            runtime,
            settings: settings.clone(),
            state: Mutex::new(None),
        }
    }

    /// Method of the current hold, if any
    pub fn active_method(&self) -> Option<DisplayMethod> {
        self.state.lock().as_ref().map(|hold| hold.method)
    }

    fn xset(&self, args: &[&str]) -> std::io::Result<()> {
        exec::run_checked(XSET, args, self.settings.call_timeout)
    }

    fn activate(&self, method: DisplayMethod) -> std::io::Result<DisplayHold> {
        let reset_loop = match method {
            DisplayMethod::ScreenSaverOff => {
                self.xset(&["s", "off"])?;
                None
            }
            DisplayMethod::DpmsOff => {
                self.xset(&["-dpms"])?;
                None
            }
            DisplayMethod::ResetLoop => {
                let program = exec::find_binary(XSET).ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "xset not found in PATH")
                })?;
                Some(spawn_reset_loop(
                    &self.runtime,
                    program,
                    self.settings.idle_reset_interval,
                    self.settings.call_timeout,
                ))
            }
        };

        Ok(DisplayHold { method, reset_loop })
    }

    fn deactivate(&self, hold: DisplayHold) -> std::io::Result<()> {
        match hold.method {
            DisplayMethod::ScreenSaverOff => self.xset(&["s", "on"]),
            DisplayMethod::DpmsOff => self.xset(&["+dpms"]),
            DisplayMethod::ResetLoop => {
                if let Some(reset_loop) = hold.reset_loop {
                    reset_loop.stop();
                }
                Ok(())
            }
        }
    }
}

/// Run `xset s reset` every `interval` until cancelled.
fn spawn_reset_loop(
    runtime: &Handle,
    program: PathBuf,
    interval: Duration,
    call_timeout: Duration,
) -> ResetLoop {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = runtime.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) =
                        exec::run_checked_async(program.clone(), &["s", "reset"], call_timeout).await
                    {
                        tracing::warn!(error = %e, "Idle reset failed");
                    }
                }
            }
        }

        tracing::debug!("Idle reset loop stopped");
    });

    ResetLoop { cancel, task }
}

impl Provider for DisplayProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn available(&self) -> bool {
        if !self.is_x11 || exec::find_binary(XSET).is_none() {
            return false;
        }

        match self.xset(&["q"]) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "X server not reachable");
                false
            }
        }
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn acquire(&self, _reason: &str) -> Result<Cookie> {
        let mut state = self.state.lock();
        if let Some(hold) = state.as_ref() {
            return Ok(Cookie::Display(hold.method));
        }

        let mut failures = Vec::new();
        for method in METHODS {
            match self.activate(method) {
                Ok(hold) => {
                    tracing::info!(method = %method.as_str(), "Inhibited via display server");
                    *state = Some(hold);
                    return Ok(Cookie::Display(method));
                }
                Err(e) => {
                    tracing::debug!(method = %method.as_str(), error = %e, "Display method failed");
                    failures.push(format!("{}: {}", method.as_str(), e));
                }
            }
        }

        Err(ProviderError::acquire(NAME, failures.join("; ")))
    }

    fn release(&self, cookie: &Cookie) -> Result<()> {
        let Cookie::Display(method) = cookie else {
            return Err(ProviderError::CookieMismatch {
                provider: NAME.to_string(),
            });
        };

        let mut state = self.state.lock();
        let hold = match state.take() {
            Some(hold) if hold.method == *method => hold,
            other => {
                *state = other;
                return Err(ProviderError::release(NAME, "no matching inhibit is active"));
            }
        };

        self.deactivate(hold)
            .map_err(|e| ProviderError::release(NAME, e))?;

        tracing::info!(method = %method.as_str(), "Released display server inhibit");
        Ok(())
    }

    fn status(&self) -> Result<bool> {
        Ok(self.state.lock().is_some())
    }
}

impl Drop for DisplayProvider {
    fn drop(&mut self) {
        if let Some(reset_loop) = self.state.get_mut().take().and_then(|h| h.reset_loop) {
            reset_loop.stop();
        }
    }
}
