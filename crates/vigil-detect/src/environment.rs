//! Environment snapshot

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayServer {
    X11,
    Wayland,
    /// Terminal-only session, no graphical display
    Console,
    Unknown,
}

impl DisplayServer {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayServer::X11 => "x11",
            DisplayServer::Wayland => "wayland",
            DisplayServer::Console => "console",
            DisplayServer::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DisplayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable snapshot of the session the process runs in.
///
/// Built once per process by [`crate::detect`] and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub display_server: DisplayServer,
    /// Normalized desktop name (`gnome`, `kde`, ...) or `unknown`
    pub desktop_env: String,
    /// Raw `XDG_SESSION_TYPE`, empty when unset
    pub session_type: String,
    pub has_session_bus: bool,
    pub has_init_inhibitor: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            display_server: DisplayServer::Unknown,
            desktop_env: "unknown".to_string(),
            session_type: String::new(),
            has_session_bus: false,
            has_init_inhibitor: false,
        }
    }
}
