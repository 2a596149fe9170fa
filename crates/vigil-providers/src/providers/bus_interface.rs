//! Known session-bus inhibit interfaces
//!
//! Every interface has its own method signature, so each variant builds its
//! own `Inhibit` and release calls.

use std::collections::HashMap;

use zbus::blocking::Connection;
use zbus::zvariant::{OwnedObjectPath, Value};

use crate::cookie::BusToken;

/// `Inhibit` flags understood by GNOME/MATE and the portal: suspend | idle
const INHIBIT_SUSPEND_IDLE: u32 = 4 | 8;

const INTROSPECTABLE: &str = "org.freedesktop.DBus.Introspectable";
const PORTAL_REQUEST: &str = "org.freedesktop.portal.Request";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusInterface {
    /// org.gnome.SessionManager
    GnomeSessionManager,
    /// org.mate.SessionManager
    MateSessionManager,
    /// org.freedesktop.ScreenSaver (KDE, LXQt, most screen lockers)
    FreedesktopScreenSaver,
    /// org.freedesktop.PowerManagement.Inhibit (xfce4-power-manager and friends)
    PowerManagement,
    /// org.freedesktop.portal.Inhibit
    Portal,
}

impl BusInterface {
    /// Generic interfaces tried after the desktop-specific ones
    const GENERIC: [BusInterface; 3] = [
        BusInterface::Portal,
        BusInterface::FreedesktopScreenSaver,
        BusInterface::PowerManagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BusInterface::GnomeSessionManager => "gnome-session",
            BusInterface::MateSessionManager => "mate-session",
            BusInterface::FreedesktopScreenSaver => "screensaver",
            BusInterface::PowerManagement => "power-management",
            BusInterface::Portal => "portal",
        }
    }

    fn destination(&self) -> &'static str {
        match self {
            BusInterface::GnomeSessionManager => "org.gnome.SessionManager",
            BusInterface::MateSessionManager => "org.mate.SessionManager",
            BusInterface::FreedesktopScreenSaver => "org.freedesktop.ScreenSaver",
            BusInterface::PowerManagement => "org.freedesktop.PowerManagement",
            BusInterface::Portal => "org.freedesktop.portal.Desktop",
        }
    }

    fn path(&self) -> &'static str {
        match self {
            BusInterface::GnomeSessionManager => "/org/gnome/SessionManager",
            BusInterface::MateSessionManager => "/org/mate/SessionManager",
            BusInterface::FreedesktopScreenSaver => "/org/freedesktop/ScreenSaver",
            BusInterface::PowerManagement => "/org/freedesktop/PowerManagement/Inhibit",
            BusInterface::Portal => "/org/freedesktop/portal/desktop",
        }
    }

    fn interface(&self) -> &'static str {
        match self {
            BusInterface::GnomeSessionManager => "org.gnome.SessionManager",
            BusInterface::MateSessionManager => "org.mate.SessionManager",
            BusInterface::FreedesktopScreenSaver => "org.freedesktop.ScreenSaver",
            BusInterface::PowerManagement => "org.freedesktop.PowerManagement.Inhibit",
            BusInterface::Portal => "org.freedesktop.portal.Inhibit",
        }
    }

    /// Candidates for `desktop`, best match first, without duplicates.
    pub fn ranked_for(desktop: &str) -> Vec<BusInterface> {
        let preferred = match desktop {
            "gnome" | "unity" | "budgie" | "pantheon" | "cosmic" => {
                Some(BusInterface::GnomeSessionManager)
            }
            "mate" => Some(BusInterface::MateSessionManager),
            "kde" | "lxqt" | "deepin" => Some(BusInterface::FreedesktopScreenSaver),
            "xfce" | "lxde" => Some(BusInterface::PowerManagement),
            _ => None,
        };

        let mut ranked: Vec<BusInterface> = preferred.into_iter().collect();
        for candidate in Self::GENERIC {
            if !ranked.contains(&candidate) {
                ranked.push(candidate);
            }
        }
        ranked
    }

    /// Whether the service is on the bus and exports this interface.
    pub(crate) fn probe(&self, conn: &Connection) -> bool {
        let xml: zbus::Result<String> = conn
            .call_method(
                Some(self.destination()),
                self.path(),
                Some(INTROSPECTABLE),
                "Introspect",
                &(),
            )
            .and_then(|reply| reply.body().deserialize::<String>());

        match xml {
            Ok(xml) => xml.contains(&format!("\"{}\"", self.interface())),
            Err(e) => {
                tracing::debug!(interface = %self.as_str(), error = %e, "Introspection failed");
                false
            }
        }
    }

    pub(crate) fn inhibit(
        &self,
        conn: &Connection,
        app_name: &str,
        reason: &str,
    ) -> zbus::Result<BusToken> {
        let destination = Some(self.destination());
        let interface = Some(self.interface());

        match self {
            BusInterface::GnomeSessionManager | BusInterface::MateSessionManager => {
                // (app_id, toplevel_xid, reason, flags); no window to attach to
                let reply = conn.call_method(
                    destination,
                    self.path(),
                    interface,
                    "Inhibit",
                    &(app_name, 0u32, reason, INHIBIT_SUSPEND_IDLE),
                )?;
                Ok(BusToken::Id(reply.body().deserialize::<u32>()?))
            }
            BusInterface::FreedesktopScreenSaver | BusInterface::PowerManagement => {
                let reply = conn.call_method(
                    destination,
                    self.path(),
                    interface,
                    "Inhibit",
                    &(app_name, reason),
                )?;
                Ok(BusToken::Id(reply.body().deserialize::<u32>()?))
            }
            BusInterface::Portal => {
                let mut options: HashMap<&str, Value<'_>> = HashMap::new();
                options.insert("reason", Value::from(reason));

                let reply = conn.call_method(
                    destination,
                    self.path(),
                    interface,
                    "Inhibit",
                    &("", INHIBIT_SUSPEND_IDLE, options),
                )?;
                let handle: OwnedObjectPath = reply.body().deserialize()?;
                Ok(BusToken::Handle(handle.as_str().to_string()))
            }
        }
    }

    pub(crate) fn uninhibit(&self, conn: &Connection, token: &BusToken) -> zbus::Result<()> {
        match (self, token) {
            (BusInterface::GnomeSessionManager | BusInterface::MateSessionManager, BusToken::Id(id)) => {
                conn.call_method(
                    Some(self.destination()),
                    self.path(),
                    Some(self.interface()),
                    "Uninhibit",
                    &(*id,),
                )?;
            }
            (BusInterface::FreedesktopScreenSaver | BusInterface::PowerManagement, BusToken::Id(id)) => {
                conn.call_method(
                    Some(self.destination()),
                    self.path(),
                    Some(self.interface()),
                    "UnInhibit",
                    &(*id,),
                )?;
            }
            (BusInterface::Portal, BusToken::Handle(handle)) => {
                conn.call_method(
                    Some(self.destination()),
                    handle.as_str(),
                    Some(PORTAL_REQUEST),
                    "Close",
                    &(),
                )?;
            }
            (interface, token) => {
                return Err(zbus::Error::Failure(format!(
                    "{} cannot release token {:?}",
                    interface.as_str(),
                    token
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_match_comes_first() {
        let ranked = BusInterface::ranked_for("gnome");
        assert_eq!(
            ranked,
            vec![
                BusInterface::GnomeSessionManager,
                BusInterface::Portal,
                BusInterface::FreedesktopScreenSaver,
                BusInterface::PowerManagement,
            ]
        );

        assert_eq!(
            BusInterface::ranked_for("mate")[0],
            BusInterface::MateSessionManager
        );
    }

    #[test]
    fn test_no_duplicates_when_desktop_uses_generic() {
        let ranked = BusInterface::ranked_for("kde");
        assert_eq!(
            ranked,
            vec![
                BusInterface::FreedesktopScreenSaver,
                BusInterface::Portal,
                BusInterface::PowerManagement,
            ]
        );
    }

    #[test]
    fn test_unknown_desktop_gets_generic_list() {
        assert_eq!(
            BusInterface::ranked_for("unknown"),
            BusInterface::GENERIC.to_vec()
        );
    }
}
