//! Suspend signal: when did the machine last wake up from sleep?

pub mod logind;

use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Instant;

use tracing::debug;

use crate::signal::SignalError;
use crate::signal::SuspendSource;

const SOURCE: &str = "suspend listener";

#[derive(Debug, Default)]
struct ResumeState {
    last_resume: Option<Instant>,
    /// Set once the listener has stopped delivering events.
    failure: Option<String>,
}

/// Shared record of the latest resume-from-sleep event.
///
/// Cloned handles share the same slot: the event listener writes, the
/// monitor reads.
#[derive(Debug, Clone, Default)]
pub struct ResumeTracker {
    state: Arc<RwLock<ResumeState>>,
}

impl ResumeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resume at `at`. Older timestamps never move the value back.
    pub fn record_resume(&self, at: Instant) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.last_resume.is_none_or(|prev| at > prev) {
            debug!("Recorded resume from sleep");
            state.last_resume = Some(at);
        }
    }

    /// Mark the event feed as dead. Every later read fails with `reason`.
    pub fn record_failure(&self, reason: impl ToString) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.failure = Some(reason.to_string());
    }

    /// Latest recorded resume, `None` until the first one.
    pub fn last_resume(&self) -> Option<Instant> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_resume
    }
}

impl SuspendSource for ResumeTracker {
    fn last_resume_time(&self) -> Result<Option<Instant>, SignalError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        match state.failure {
            Some(ref reason) => Err(SignalError::unavailable(SOURCE, reason)),
            None => Ok(state.last_resume),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InteractionStatus;
    use crate::monitor::RestingMonitor;
    use crate::monitor::RestingPolicy;
    use crate::signal::InteractionSource;
    use std::time::Duration;

    struct AlwaysBusy;

    impl InteractionSource for AlwaysBusy {
        fn status(&self) -> Result<InteractionStatus, SignalError> {
            Ok(InteractionStatus::Busy)
        }
    }

    #[test]
    fn test_never_resumed() {
        let tracker = ResumeTracker::new();
        assert_eq!(tracker.last_resume_time(), Ok(None));
    }

    #[test]
    fn test_clones_share_state() {
        let tracker = ResumeTracker::new();
        let writer = tracker.clone();

        let now = Instant::now();
        writer.record_resume(now);

        assert_eq!(tracker.last_resume(), Some(now));
    }

    #[test]
    fn test_resume_time_never_decreases() {
        let tracker = ResumeTracker::new();
        let later = Instant::now() + Duration::from_secs(10);
        let earlier = Instant::now();

        tracker.record_resume(later);
        tracker.record_resume(earlier);
        assert_eq!(tracker.last_resume(), Some(later));

        let latest = later + Duration::from_secs(1);
        tracker.record_resume(latest);
        assert_eq!(tracker.last_resume(), Some(latest));
    }

    #[test]
    fn test_concurrent_writer() {
        let tracker = ResumeTracker::new();
        let writer = tracker.clone();
        let base = Instant::now();

        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                writer.record_resume(base + Duration::from_millis(i));
            }
        });

        let mut seen = None;
        for _ in 0..100 {
            let current = tracker.last_resume();
            assert!(current >= seen);
            seen = current;
        }

        handle.join().unwrap();
        assert_eq!(tracker.last_resume(), Some(base + Duration::from_millis(99)));
    }

    #[test]
    fn test_failure_is_reported_on_every_read() {
        let tracker = ResumeTracker::new();
        let now = Instant::now();
        tracker.record_resume(now);

        tracker.record_failure("stream ended");
        assert_eq!(
            tracker.last_resume_time(),
            Err(SignalError::unavailable(SOURCE, "stream ended"))
        );

        tracker.record_resume(now + Duration::from_secs(1));
        assert!(tracker.last_resume_time().is_err());
    }

    #[test]
    fn test_failed_tracker_fails_monitor_update() {
        let tracker = ResumeTracker::new();
        let policy = RestingPolicy {
            max_busy_time: Duration::from_secs(300),
            resting_time: Duration::from_secs(300),
            initial_status: InteractionStatus::Busy,
        };
        let mut monitor = RestingMonitor::new(policy, AlwaysBusy, tracker.clone());

        monitor.update(Duration::from_secs(10)).unwrap();

        tracker.record_failure("stream ended");
        assert_eq!(
            monitor.update(Duration::from_secs(10)),
            Err(SignalError::unavailable(SOURCE, "stream ended"))
        );
    }
}
