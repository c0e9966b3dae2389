//! Wall-clock time derived from the tokio timer.
//!
//! Credential expiry and message expiry are wall-clock instants, while every delay
//! in the client runs on `tokio::time`. `MonotonicClock` anchors one to the other so
//! that both advance together, including under paused test time.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor_wall: DateTime<Utc>,
    anchor_instant: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            anchor_wall: Utc::now(),
            anchor_instant: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = self.anchor_instant.elapsed();
        self.anchor_wall + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::MAX)
    }

    /// The tokio instant corresponding to `at`, clamped to now for past instants
    pub fn instant_at(&self, at: DateTime<Utc>) -> Instant {
        let delay = (at - self.now()).to_std().unwrap_or(Duration::ZERO);
        Instant::now() + delay
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
