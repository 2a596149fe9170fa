//! Vigil Sessions
//!
//! A session is one caller-declared activity that keeps the system awake:
//! - Created when a provider grants a hold
//! - Optionally bounded by a duration, after which it expires on its own
//! - Destroyed on explicit stop, expiry, or bulk cleanup
//!
//! Persisting sessions is the caller's job; this crate only keeps the live
//! table and its timers.

mod error;
mod manager;
mod session;
mod timer;

pub use error::SessionError;
pub use manager::{ExpiryHook, SessionManager};
pub use session::Session;
pub use timer::{Expire, Scheduler, TimerHandle};

pub type Result<T> = std::result::Result<T, SessionError>;
