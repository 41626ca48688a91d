use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat line shown on the dashboard. Published once, fanned out,
/// then dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatEvent {
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
