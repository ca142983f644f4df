//! Rest warning throttling.
//!
//! Rules:
//! - Warn only while the user is tired
//! - Warn again only once more than `interval` has passed since the last one
//! - The clock starts when the throttle is created, so startup never warns

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::domain::UserStatus;

/// Decision from the throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningDecision {
    /// Show the warning.
    Warn,
    /// Stay quiet this tick.
    Skip,
}

/// Rate limiter for rest warnings.
#[derive(Debug)]
pub struct WarningThrottle {
    /// When the last warning was delivered (or the throttle was created).
    last_warning: Instant,

    /// Minimum time between warnings.
    interval: Duration,
}

impl WarningThrottle {
    /// Create a throttle whose first warning can come `interval` after `now`.
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            last_warning: now,
            interval,
        }
    }

    /// Check whether a warning is due for `status` at `now`.
    pub fn should_warn(&self, status: UserStatus, now: Instant) -> WarningDecision {
        if status != UserStatus::Tired {
            return WarningDecision::Skip;
        }

        let since_last = now.saturating_duration_since(self.last_warning);
        if since_last > self.interval {
            debug!(
                "Tired and {:?} since last warning > {:?}, warning",
                since_last, self.interval
            );
            WarningDecision::Warn
        } else {
            debug!(
                "Tired but warned {:?} ago (interval {:?}), skipping",
                since_last, self.interval
            );
            WarningDecision::Skip
        }
    }

    /// Record that a warning was delivered at `now`.
    pub fn record_warned(&mut self, now: Instant) {
        self.last_warning = now;
    }
}
