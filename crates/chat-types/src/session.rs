use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wire::{de_id, de_opt_timestamp, de_timestamp};

/// A conversation thread as listed in the sidebar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "Utc::now", deserialize_with = "de_timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "de_opt_timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            updated_at: now,
            created_at: Some(now),
        }
    }

    /// Mark as just used. Never moves `updated_at` backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.updated_at {
            self.updated_at = at;
        }
    }
}

/// Most recently updated first. Stable, so ties keep their current order.
pub fn sort_by_recency(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// Trim a user-supplied title and cap it at `max_chars`.
/// Returns `None` for a blank title, which callers treat as "cancel".
pub fn clamp_title(title: &str, max_chars: usize) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(max_chars).collect())
}
