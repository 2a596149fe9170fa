//! Inhibition handles

use crate::providers::BusInterface;

/// Reply of a session-bus `Inhibit` call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BusToken {
    /// Numeric cookie (GNOME/MATE session managers, ScreenSaver, PowerManagement)
    Id(u32),
    /// Request object path (XDG desktop portal)
    Handle(String),
}

/// How the display provider suppressed idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayMethod {
    ScreenSaverOff,
    DpmsOff,
    ResetLoop,
}

impl DisplayMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMethod::ScreenSaverOff => "screensaver-off",
            DisplayMethod::DpmsOff => "dpms-off",
            DisplayMethod::ResetLoop => "reset-loop",
        }
    }
}

/// Opaque handle returned by [`crate::Provider::acquire`], needed to release
/// the same hold again.
///
/// Each variant belongs to one provider kind; handing a cookie to a provider
/// of another kind fails with [`crate::ProviderError::CookieMismatch`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cookie {
    Bus {
        interface: BusInterface,
        token: BusToken,
    },
    Display(DisplayMethod),
    Process {
        pid: u32,
    },
    /// Counter issued by providers without a real OS resource
    Inert(u64),
}

impl std::fmt::Display for Cookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cookie::Bus {
                interface,
                token: BusToken::Id(id),
            } => write!(f, "{}#{}", interface.as_str(), id),
            Cookie::Bus {
                interface,
                token: BusToken::Handle(path),
            } => write!(f, "{}@{}", interface.as_str(), path),
            Cookie::Display(method) => write!(f, "display:{}", method.as_str()),
            Cookie::Process { pid } => write!(f, "pid:{}", pid),
            Cookie::Inert(n) => write!(f, "inert:{}", n),
        }
    }
}
