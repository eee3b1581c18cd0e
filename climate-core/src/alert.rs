use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum number of alerts kept on screen.
pub const ALERT_CAPACITY: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Bounded, most-recent-first list of user-facing alerts.
#[derive(Debug, Clone, Default)]
pub struct AlertLog {
    entries: VecDeque<Alert>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend an alert, evicting the oldest once the log is full.
    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.push_front(Alert {
            message: message.into(),
            created_at: Utc::now(),
        });
        self.entries.truncate(ALERT_CAPACITY);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|a| a.message.as_str()).collect()
    }

    pub fn as_slice(&mut self) -> &[Alert] {
        self.entries.make_contiguous()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
