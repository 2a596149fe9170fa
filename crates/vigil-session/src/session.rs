//! Session data structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: String,
    /// Name of the provider holding the inhibit
    #[serde(rename = "provider")]
    pub provider_name: String,
    pub start_time: DateTime<Utc>,
    /// Zero means unbounded
    #[serde(with = "nanos")]
    pub duration: Duration,
    pub reason: String,
    /// `start_time + duration` for bounded sessions
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(provider_name: String, reason: String, duration: Duration) -> Self {
        let start_time = Utc::now();
        let expires_at = if duration.is_zero() {
            None
        } else {
            // Too far out for chrono: expire at the end of time instead
            Some(
                chrono::Duration::from_std(duration)
                    .ok()
                    .and_then(|d| start_time.checked_add_signed(d))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            )
        };

        Self {
            id: Uuid::new_v4().to_string(),
            provider_name,
            start_time,
            duration,
            reason,
            expires_at,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.expires_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether the session started more than `window` before `now`
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match chrono::Duration::from_std(window) {
            Ok(window) => self.start_time < now - window,
            Err(_) => false,
        }
    }

    /// Time left before expiry; `None` for unbounded sessions
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
    }
}

/// Durations on disk are integer nanoseconds.
mod nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        serializer.serialize_i64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = i64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos.max(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_session() {
        let session = Session::new("fallback".to_string(), "build".to_string(), Duration::ZERO);
        assert!(!session.is_bounded());
        assert!(session.expires_at.is_none());
        assert!(session.remaining(Utc::now()).is_none());
        assert!(!session.is_expired(Utc::now() + chrono::Duration::days(365)));
    }

    #[test]
    fn test_bounded_session() {
        let session = Session::new(
            "fallback".to_string(),
            "build".to_string(),
            Duration::from_secs(60),
        );
        let expires_at = session.expires_at.unwrap();
        assert_eq!(expires_at - session.start_time, chrono::Duration::seconds(60));

        assert!(!session.is_expired(session.start_time));
        assert!(session.is_expired(expires_at));
        assert_eq!(session.remaining(expires_at), Some(Duration::ZERO));
        assert_eq!(
            session.remaining(session.start_time),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_huge_duration_stays_bounded() {
        let session = Session::new(
            "fallback".to_string(),
            "forever-ish".to_string(),
            Duration::from_secs(u64::MAX),
        );
        assert!(session.is_bounded());
        assert_eq!(session.expires_at, Some(DateTime::<Utc>::MAX_UTC));
        assert!(!session.is_expired(Utc::now()));
        assert!(session.remaining(Utc::now()).unwrap() > Duration::from_secs(3600));
    }

    #[test]
    fn test_staleness() {
        let mut session = Session::new("fallback".to_string(), String::new(), Duration::ZERO);
        let window = Duration::from_secs(24 * 60 * 60);
        assert!(!session.is_stale(Utc::now(), window));

        session.start_time = Utc::now() - chrono::Duration::hours(25);
        assert!(session.is_stale(Utc::now(), window));
    }

    #[test]
    fn test_wire_format() {
        let session = Session::new(
            "fallback".to_string(),
            "demo".to_string(),
            Duration::from_millis(1500),
        );
        let value = serde_json::to_value(&session).unwrap();

        assert_eq!(value["provider"], "fallback");
        assert_eq!(value["duration"], 1_500_000_000i64);
        assert!(value["expires_at"].is_string());

        let unbounded = Session::new("fallback".to_string(), String::new(), Duration::ZERO);
        let value = serde_json::to_value(&unbounded).unwrap();
        assert!(value["expires_at"].is_null());

        let back: Session = serde_json::from_value(value).unwrap();
        assert_eq!(back, unbounded);
    }
}
