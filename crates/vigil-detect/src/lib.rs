//! Vigil Environment Detection
//!
//! Classifies the running session from process environment variables plus a
//! few filesystem existence checks:
//! - Display server (X11, Wayland, console)
//! - Desktop environment, normalized through an alias table
//! - Availability of a session bus and of the init-manager inhibitor
//!
//! Detection never fails. Anything that cannot be determined is reported as
//! unknown or unavailable.

mod detect;
mod environment;
mod source;

pub use detect::{detect, detect_with};
pub use environment::{DisplayServer, Environment};
pub use source::{EnvSource, SystemEnv};
