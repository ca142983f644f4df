//! Resting monitor: the busy/idle accumulation state machine.
//!
//! Every tick consumes the raw interaction signal, the elapsed wall-clock
//! slice and the last resume-from-sleep time, and updates two counters:
//! busy time and idle time since the user last rested.
//!
//! Rules, applied in order on each [`RestingMonitor::update`]:
//! - The slice is credited to the bucket of the current status, but only if
//!   the status did not change since the previous tick.
//! - A resume newer than the last one seen zeroes both counters.
//! - Otherwise, no busy time means no idle time either.
//! - Otherwise, idle time reaching the resting time zeroes both counters.

use std::time::Duration;
use std::time::Instant;

use tracing::debug;
use tracing::trace;

use crate::domain::InteractionStatus;
use crate::domain::UserStatus;
use crate::signal::InteractionSource;
use crate::signal::SignalError;
use crate::signal::SuspendSource;

/// Thresholds that drive the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestingPolicy {
    /// Busy time beyond this means the user is tired.
    pub max_busy_time: Duration,

    /// Idle time at or above this means the user is fully rested.
    pub resting_time: Duration,

    /// Status assumed before the first tick.
    pub initial_status: InteractionStatus,
}

/// Tracks busy and idle time since the user last rested.
///
/// Not synchronized: callers must not run `update` concurrently.
#[derive(Debug)]
pub struct RestingMonitor<I, S> {
    policy: RestingPolicy,
    interaction: I,
    suspend: S,

    busy: Duration,
    idle: Duration,

    /// Status observed on the previous tick.
    last_status: InteractionStatus,

    /// Most recent resume already reacted to.
    last_resume: Option<Instant>,
}

impl<I: InteractionSource, S: SuspendSource> RestingMonitor<I, S> {
    /// Create a monitor seeded with the policy's initial status.
    pub fn new(policy: RestingPolicy, interaction: I, suspend: S) -> Self {
        Self {
            policy,
            interaction,
            suspend,
            busy: Duration::ZERO,
            idle: Duration::ZERO,
            last_status: policy.initial_status,
            last_resume: None,
        }
    }

    /// Advance the state machine by one tick of `elapsed` time.
    ///
    /// `elapsed` is measured by the caller since its previous call.
    pub fn update(&mut self, elapsed: Duration) -> Result<(), SignalError> {
        let current = self.interaction.status()?;

        if current == self.last_status {
            let bucket = self.accumulator_mut(current);
            *bucket = bucket.saturating_add(elapsed);
        } else {
            debug!(
                "Interaction status changed: {} -> {}, dropping {:?}",
                self.last_status.as_str(),
                current.as_str(),
                elapsed
            );
        }

        self.last_status = current;

        let resumed_at = self.suspend.last_resume_time()?;
        if resumed_at > self.last_resume {
            debug!("Resume from sleep detected, resetting counters");
            self.last_resume = resumed_at;
            self.reset();
        } else if self.busy.is_zero() {
            self.idle = Duration::ZERO;
        } else if self.idle >= self.policy.resting_time {
            debug!(
                "Rested for {:?} after {:?} busy, resetting counters",
                self.idle, self.busy
            );
            self.reset();
        }

        trace!(
            "Tick: status={}, busy={:?}, idle={:?}",
            self.last_status.as_str(),
            self.busy,
            self.idle
        );

        Ok(())
    }

    /// Busy time accumulated since the user last rested.
    pub fn total_busy_time_since_rested(&self) -> Duration {
        self.busy
    }

    /// Idle time accumulated since the user last rested.
    pub fn total_idle_time_since_rested(&self) -> Duration {
        self.idle
    }

    /// Whether busy time exceeded the allowed maximum.
    pub fn must_rest(&self) -> bool {
        self.busy > self.policy.max_busy_time
    }

    /// Derived status. Tired wins over the instantaneous signal.
    pub fn user_status(&self) -> UserStatus {
        if self.must_rest() {
            return UserStatus::Tired;
        }

        match self.last_status {
            InteractionStatus::Busy => UserStatus::Busy,
            InteractionStatus::Idle => UserStatus::Resting,
        }
    }

    /// Raw status observed on the last tick.
    pub fn last_status(&self) -> InteractionStatus {
        self.last_status
    }

    /// Accumulated time in the bucket of the last observed status.
    pub fn time_in_current_status(&self) -> Duration {
        match self.last_status {
            InteractionStatus::Busy => self.busy,
            InteractionStatus::Idle => self.idle,
        }
    }

    pub fn policy(&self) -> &RestingPolicy {
        &self.policy
    }

    fn accumulator_mut(&mut self, status: InteractionStatus) -> &mut Duration {
        match status {
            InteractionStatus::Busy => &mut self.busy,
            InteractionStatus::Idle => &mut self.idle,
        }
    }

    fn reset(&mut self) {
        self.busy = Duration::ZERO;
        self.idle = Duration::ZERO;
    }
}
