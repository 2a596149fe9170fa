//! Detection rules
//!
//! Display server resolution order:
//! ```text
//! XDG_SESSION_TYPE (x11 | wayland | tty)
//!   ↓ unset or unrecognized
//! WAYLAND_DISPLAY present      → wayland
//!   ↓
//! DISPLAY present              → x11
//!   ↓
//! TERM present                 → console
//!   ↓
//! unknown
//! ```

use std::path::{Path, PathBuf};

use crate::environment::{DisplayServer, Environment};
use crate::source::{EnvSource, SystemEnv};

/// Normalizes `XDG_CURRENT_DESKTOP` entries.
const DESKTOP_ALIASES: &[(&str, &str)] = &[
    ("gnome", "gnome"),
    ("gnome-classic", "gnome"),
    ("gnome-flashback", "gnome"),
    ("ubuntu", "gnome"),
    ("pop", "gnome"),
    ("unity", "unity"),
    ("kde", "kde"),
    ("plasma", "kde"),
    ("xfce", "xfce"),
    ("xubuntu", "xfce"),
    ("mate", "mate"),
    ("cinnamon", "cinnamon"),
    ("x-cinnamon", "cinnamon"),
    ("lxde", "lxde"),
    ("lxqt", "lxqt"),
    ("budgie", "budgie"),
    ("budgie-desktop", "budgie"),
    ("deepin", "deepin"),
    ("dde", "deepin"),
    ("pantheon", "pantheon"),
    ("enlightenment", "enlightenment"),
    ("cosmic", "cosmic"),
];

/// Desktop-specific marker variables, checked in order.
const DESKTOP_MARKERS: &[(&str, &str)] = &[
    ("GNOME_DESKTOP_SESSION_ID", "gnome"),
    ("KDE_FULL_SESSION", "kde"),
    ("MATE_DESKTOP_SESSION_ID", "mate"),
    ("CINNAMON_VERSION", "cinnamon"),
    ("XFCE4_SESSION_NAME", "xfce"),
];

/// Reduced table for the legacy `DESKTOP_SESSION` variable.
const LEGACY_SESSION_ALIASES: &[(&str, &str)] = &[
    ("gnome", "gnome"),
    ("ubuntu", "gnome"),
    ("kde", "kde"),
    ("plasma", "kde"),
    ("xfce", "xfce"),
    ("mate", "mate"),
    ("cinnamon", "cinnamon"),
    ("lxde", "lxde"),
];

const SYSTEMD_RUNTIME_DIR: &str = "/run/systemd/system";

/// Detect the environment of the current process.
pub fn detect() -> Environment {
    detect_with(&SystemEnv)
}

/// Detect the environment from an arbitrary source.
///
/// Deterministic: the same source always yields the same snapshot.
pub fn detect_with<S: EnvSource + ?Sized>(source: &S) -> Environment {
    let environment = Environment {
        display_server: display_server(source),
        desktop_env: desktop_env(source),
        session_type: non_empty(source, "XDG_SESSION_TYPE").unwrap_or_default(),
        has_session_bus: has_session_bus(source),
        has_init_inhibitor: source.path_exists(Path::new(SYSTEMD_RUNTIME_DIR)),
    };

    tracing::debug!(
        display_server = %environment.display_server,
        desktop = %environment.desktop_env,
        session_bus = environment.has_session_bus,
        init_inhibitor = environment.has_init_inhibitor,
        "Detected environment"
    );

    environment
}

fn non_empty<S: EnvSource + ?Sized>(source: &S, key: &str) -> Option<String> {
    source
        .var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn display_server<S: EnvSource + ?Sized>(source: &S) -> DisplayServer {
    if let Some(session_type) = non_empty(source, "XDG_SESSION_TYPE") {
        match session_type.to_lowercase().as_str() {
            "x11" => return DisplayServer::X11,
            "wayland" => return DisplayServer::Wayland,
            "tty" => return DisplayServer::Console,
            _ => {}
        }
    }

    if non_empty(source, "WAYLAND_DISPLAY").is_some() {
        DisplayServer::Wayland
    } else if non_empty(source, "DISPLAY").is_some() {
        DisplayServer::X11
    } else if non_empty(source, "TERM").is_some() {
        DisplayServer::Console
    } else {
        DisplayServer::Unknown
    }
}

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, name)| *name)
}

fn desktop_env<S: EnvSource + ?Sized>(source: &S) -> String {
    // "ubuntu:GNOME" → "ubuntu"; unlisted desktops fall through
    let current = non_empty(source, "XDG_CURRENT_DESKTOP").and_then(|current| {
        let primary = current.split(':').next().unwrap_or_default().trim().to_lowercase();
        lookup(DESKTOP_ALIASES, &primary)
    });
    if let Some(name) = current {
        return name.to_string();
    }

    if let Some((_, name)) = DESKTOP_MARKERS
        .iter()
        .find(|(marker, _)| non_empty(source, marker).is_some())
    {
        return name.to_string();
    }

    non_empty(source, "DESKTOP_SESSION")
        .and_then(|session| lookup(LEGACY_SESSION_ALIASES, &session.to_lowercase()))
        .unwrap_or("unknown")
        .to_string()
}

fn has_session_bus<S: EnvSource + ?Sized>(source: &S) -> bool {
    if non_empty(source, "DBUS_SESSION_BUS_ADDRESS").is_some() {
        return true;
    }

    non_empty(source, "XDG_RUNTIME_DIR")
        .map(|dir| source.path_exists(&PathBuf::from(dir).join("bus")))
        .unwrap_or(false)
}
