//! Where detection reads its signals from

use std::path::Path;

/// Read-only view of the process environment.
pub trait EnvSource {
    /// Value of an environment variable, `None` when unset or not unicode
    fn var(&self, key: &str) -> Option<String>;

    fn path_exists(&self, path: &Path) -> bool;
}

/// The real process environment and filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl EnvSource for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.try_exists().unwrap_or(false)
    }
}
