//! Transient user-facing notices.

use std::time::Duration;

use tokio::time::Instant;

/// How long a notice stays visible.
pub const NOTICE_TIMEOUT: Duration = Duration::from_secs(2);

/// Message shown when a blank task is submitted.
pub const EMPTY_TASK_MESSAGE: &str = "Please enter a task!";

/// A dismissible notice that clears itself after [`NOTICE_TIMEOUT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    message: &'static str,
    expires_at: Instant,
}

impl Notice {
    /// Notice for a rejected blank task, raised at `now`.
    pub fn empty_task(now: Instant) -> Self {
        Self {
            message: EMPTY_TASK_MESSAGE,
            expires_at: now + NOTICE_TIMEOUT,
        }
    }

    /// Text to show.
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// Instant at which the notice clears.
    pub const fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether the notice has run its course at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}
