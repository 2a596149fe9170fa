//! Expiry timers
//!
//! Each bounded session owns one scheduled task. On fire the task hands the
//! session id back to its target on a blocking worker, so the target takes
//! the same locks as foreground calls.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// Receiver of timer callbacks.
pub trait Expire: Send + Sync {
    fn expire(&self, session_id: &str);
}

/// Pending expiry; dropping it leaves the timer running.
#[derive(Debug)]
pub struct TimerHandle(JoinHandle<()>);

impl TimerHandle {
    pub fn cancel(self) {
        self.0.abort();
    }
}

/// Runtime owned by the scheduler when no ambient one exists.
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        // Dropping may happen on one of its own workers; never block there
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

#[derive(Clone)]
pub struct Scheduler {
    handle: Handle,
    _owned: Option<Arc<OwnedRuntime>>,
}

impl Scheduler {
    /// Use the current tokio runtime, or start a private one.
    pub fn new() -> std::io::Result<Self> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(Self {
                handle,
                _owned: None,
            });
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("vigil-timer")
            .enable_all()
            .build()?;

        Ok(Self {
            handle: runtime.handle().clone(),
            _owned: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            _owned: None,
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Call `target.expire(session_id)` once `after` has elapsed.
    ///
    /// The target is held weakly; a timer outliving its manager is a no-op.
    pub fn schedule_expiry(
        &self,
        after: Duration,
        target: Weak<dyn Expire>,
        session_id: String,
    ) -> TimerHandle {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(after).await;

            let fired = tokio::task::spawn_blocking(move || {
                if let Some(target) = target.upgrade() {
                    target.expire(&session_id);
                }
            })
            .await;

            if let Err(e) = fired {
                tracing::error!(error = %e, "Expiry callback panicked");
            }
        });

        TimerHandle(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        fired: Mutex<Vec<String>>,
    }

    impl Expire for Recorder {
        fn expire(&self, session_id: &str) {
            self.fired.lock().push(session_id.to_string());
        }
    }

    fn weak(recorder: &Arc<Recorder>) -> Weak<dyn Expire> {
        let weak: Weak<Recorder> = Arc::downgrade(recorder);
        weak
    }

    #[test]
    fn test_timer_fires() {
        let scheduler = Scheduler::new().unwrap();
        let recorder = Arc::new(Recorder::default());

        let _timer =
            scheduler.schedule_expiry(Duration::from_millis(20), weak(&recorder), "a".to_string());
        std::thread::sleep(Duration::from_millis(150));

        assert_eq!(*recorder.fired.lock(), vec!["a".to_string()]);
    }

    #[test]
    fn test_cancelled_timer_does_not_fire() {
        let scheduler = Scheduler::new().unwrap();
        let recorder = Arc::new(Recorder::default());

        let timer =
            scheduler.schedule_expiry(Duration::from_millis(50), weak(&recorder), "a".to_string());
        timer.cancel();
        std::thread::sleep(Duration::from_millis(150));

        assert!(recorder.fired.lock().is_empty());
    }

    #[test]
    fn test_dropped_target_is_ignored() {
        let scheduler = Scheduler::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let target = weak(&recorder);
        drop(recorder);

        let _timer = scheduler.schedule_expiry(Duration::from_millis(10), target, "a".to_string());
        std::thread::sleep(Duration::from_millis(80));
    }
}
