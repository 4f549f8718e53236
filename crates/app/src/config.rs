//! Runtime tuning of a [`Cube`](crate::cube::Cube).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeouts and buffer sizes used by one cube session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CubeConfig {
    /// Upper bound on every correlated reply and every read, in milliseconds.
    pub reply_timeout_ms: u64,
    /// Wait bound of a target move whose cube-side timeout is `0`.
    pub move_to_safety_timeout_ms: u64,
    /// Notification frames buffered per sub-channel.
    pub notification_buffer: usize,
    /// Events buffered by the broadcast stream.
    pub event_buffer: usize,
}

impl Default for CubeConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 2000,
            move_to_safety_timeout_ms: 30_000,
            notification_buffer: 64,
            event_buffer: 256,
        }
    }
}

impl CubeConfig {
    #[must_use]
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// How long to wait for a target move's response: the cube-side
    /// timeout (or the safety timeout when that is `0`) plus the reply
    /// timeout.
    #[must_use]
    pub fn move_to_timeout(&self, timeout_secs: u8) -> Duration {
        let device = if timeout_secs == 0 {
            Duration::from_millis(self.move_to_safety_timeout_ms)
        } else {
            Duration::from_secs(u64::from(timeout_secs))
        };
        device + self.reply_timeout()
    }
}
