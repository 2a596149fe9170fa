//! On-disk document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATE_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState<T> {
    pub version: String,
    pub saved_at: DateTime<Utc>,
    pub sessions: Vec<T>,
}

impl<T> PersistedState<T> {
    pub fn new(sessions: Vec<T>) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            saved_at: Utc::now(),
            sessions,
        }
    }
}
