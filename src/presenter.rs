//! Presenter: drives the resting monitor on a timer and renders the result.
//!
//! Each tick measures the real elapsed time on its own clock (the timer may
//! fire late), feeds it to the monitor, and forwards a [`StatusReport`] to a
//! [`StatusSurface`], warning the user when they are tired.

use std::time::Duration;

use serde::Serialize;
use serde::Serializer;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::domain::UserStatus;
use crate::monitor::RestingMonitor;
use crate::signal::InteractionSource;
use crate::signal::SignalError;
use crate::signal::SuspendSource;
use crate::surface::StatusSurface;
use crate::throttle::WarningDecision;
use crate::throttle::WarningThrottle;

/// Longest status summary shown, in characters.
const SUMMARY_MAX_CHARS: usize = 63;

const WARNING_TITLE: &str = "Must rest!";

/// Snapshot of the monitor after a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: UserStatus,

    #[serde(rename = "busy_seconds", serialize_with = "serialize_secs")]
    pub busy: Duration,

    #[serde(rename = "idle_seconds", serialize_with = "serialize_secs")]
    pub idle: Duration,

    pub must_rest: bool,
}

impl StatusReport {
    pub fn from_monitor<I, S>(monitor: &RestingMonitor<I, S>) -> Self
    where
        I: InteractionSource,
        S: SuspendSource,
    {
        Self {
            status: monitor.user_status(),
            busy: monitor.total_busy_time_since_rested(),
            idle: monitor.total_idle_time_since_rested(),
            must_rest: monitor.must_rest(),
        }
    }

    /// One-line summary, e.g. "Busy for 5m 1s and idle for 20s".
    pub fn summary(&self) -> String {
        truncate(
            &format!(
                "Busy for {} and idle for {}",
                format_duration(self.busy),
                format_duration(self.idle)
            ),
            SUMMARY_MAX_CHARS,
        )
    }
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}

/// Format a duration as "1h 2m 3s", dropping zero parts and sub-seconds.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }

    parts.join(" ")
}

/// Cut `text` to at most `max_chars` characters, ending with an ellipsis
/// when shortened.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Measures the time between consecutive laps.
#[derive(Debug)]
pub struct ElapsedClock {
    last: Instant,
}

impl ElapsedClock {
    pub fn new(now: Instant) -> Self {
        Self { last: now }
    }

    /// Time since the previous lap (or creation), restarting the clock.
    pub fn lap(&mut self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last);
        self.last = now;
        elapsed
    }
}

/// Owns the tick loop around a [`RestingMonitor`].
pub struct Presenter<I, S, V> {
    monitor: RestingMonitor<I, S>,
    surface: V,
    throttle: WarningThrottle,
    clock: ElapsedClock,

    /// Derived status of the previous tick.
    last_status: Option<UserStatus>,
}

impl<I, S, V> Presenter<I, S, V>
where
    I: InteractionSource,
    S: SuspendSource,
    V: StatusSurface,
{
    pub fn new(monitor: RestingMonitor<I, S>, surface: V, warning_interval: Duration) -> Self {
        let now = Instant::now();

        Self {
            monitor,
            surface,
            throttle: WarningThrottle::new(warning_interval, now),
            clock: ElapsedClock::new(now),
            last_status: None,
        }
    }

    pub fn monitor(&self) -> &RestingMonitor<I, S> {
        &self.monitor
    }

    /// Run one update: measure, update the monitor, render, maybe warn.
    ///
    /// Signal failures are returned untouched; the monitor is not updated
    /// with a guessed status.
    pub async fn tick(&mut self) -> Result<StatusReport, SignalError> {
        let now = Instant::now();
        let elapsed = self.clock.lap(now);

        self.monitor.update(elapsed)?;

        let report = StatusReport::from_monitor(&self.monitor);
        let changed = self.last_status != Some(report.status);
        self.last_status = Some(report.status);

        self.surface.show(&report, changed).await;

        if self.throttle.should_warn(report.status, now) == WarningDecision::Warn {
            let body = format!(
                "Please go rest! You haven't rested for {}.",
                format_duration(report.busy)
            );

            match self.surface.warn(WARNING_TITLE, &body).await {
                Ok(()) => self.throttle.record_warned(now),
                Err(e) => warn!("Failed to show rest warning: {}", e),
            }
        }

        Ok(report)
    }

    /// Tick every `interval` until `shutdown` fires or a signal fails.
    pub async fn run(
        &mut self,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Result<(), SignalError> {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Presenter started, updating every {:?}", interval);

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    info!("Presenter stopping");
                    return Ok(());
                }

                _ = timer.tick() => {
                    self.tick().await?;
                }
            }
        }
    }

    /// Run exactly `count` ticks, `interval` apart, and return their reports.
    pub async fn run_ticks(
        &mut self,
        count: usize,
        interval: Duration,
    ) -> Result<Vec<StatusReport>, SignalError> {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut reports = Vec::with_capacity(count);
        for n in 1..=count {
            timer.tick().await;
            let report = self.tick().await?;
            debug!("Tick {}/{}: {}", n, count, report.summary());
            reports.push(report);
        }

        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InteractionStatus;
    use crate::monitor::RestingPolicy;
    use crate::notify::NotifyError;
    use crate::suspend::ResumeTracker;
    use async_trait::async_trait;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct FakeInteraction(Rc<Cell<InteractionStatus>>);

    impl InteractionSource for FakeInteraction {
        fn status(&self) -> Result<InteractionStatus, SignalError> {
            Ok(self.0.get())
        }
    }

    struct BrokenInteraction;

    impl InteractionSource for BrokenInteraction {
        fn status(&self) -> Result<InteractionStatus, SignalError> {
            Err(SignalError::unavailable("fake", "gone"))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSurface {
        shown: Arc<Mutex<Vec<(StatusReport, bool)>>>,
        warnings: Arc<Mutex<Vec<String>>>,
        fail_warnings: bool,
    }

    #[async_trait]
    impl StatusSurface for RecordingSurface {
        async fn show(&mut self, report: &StatusReport, changed: bool) {
            self.shown.lock().unwrap().push((report.clone(), changed));
        }

        async fn warn(&mut self, title: &str, body: &str) -> Result<(), NotifyError> {
            self.warnings.lock().unwrap().push(format!("{title} {body}"));
            if self.fail_warnings {
                return Err(NotifyError::CallFailed("no daemon".to_string()));
            }
            Ok(())
        }
    }

    fn presenter(
        max_busy: Duration,
        warning_interval: Duration,
        surface: RecordingSurface,
    ) -> (
        Presenter<FakeInteraction, ResumeTracker, RecordingSurface>,
        FakeInteraction,
        ResumeTracker,
    ) {
        let interaction = FakeInteraction(Rc::new(Cell::new(InteractionStatus::Busy)));
        let tracker = ResumeTracker::new();
        let policy = RestingPolicy {
            max_busy_time: max_busy,
            resting_time: Duration::from_secs(60),
            initial_status: InteractionStatus::Busy,
        };
        let monitor = RestingMonitor::new(policy, interaction.clone(), tracker.clone());
        (
            Presenter::new(monitor, surface, warning_interval),
            interaction,
            tracker,
        )
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_millis(999)), "0s");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(301)), "5m 1s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
        assert_eq!(format_duration(Duration::from_secs(7260)), "2h 1m");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("a bit too long", 10), "a bit too…");
        assert_eq!(truncate("a bit too long", 10).chars().count(), 10);
    }

    #[test]
    fn test_summary() {
        let report = StatusReport {
            status: UserStatus::Tired,
            busy: Duration::from_secs(301),
            idle: Duration::from_secs(20),
            must_rest: true,
        };
        assert_eq!(report.summary(), "Busy for 5m 1s and idle for 20s");

        let long = StatusReport {
            busy: Duration::from_secs(u64::MAX / 2),
            idle: Duration::from_secs(u64::MAX / 2),
            ..report
        };
        assert_eq!(long.summary().chars().count(), SUMMARY_MAX_CHARS);
        assert!(long.summary().ends_with('…'));
    }

    #[test]
    fn test_report_json() {
        let report = StatusReport {
            status: UserStatus::Busy,
            busy: Duration::from_millis(90_500),
            idle: Duration::ZERO,
            must_rest: false,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "busy",
                "busy_seconds": 90,
                "idle_seconds": 0,
                "must_rest": false,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_clock_laps() {
        let mut clock = ElapsedClock::new(Instant::now());
        tokio::time::advance(Duration::from_secs(7)).await;
        assert_eq!(clock.lap(Instant::now()), Duration::from_secs(7));
        assert_eq!(clock.lap(Instant::now()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_feeds_measured_elapsed_time() {
        let surface = RecordingSurface::default();
        let (mut presenter, _, _) =
            presenter(Duration::from_secs(600), Duration::from_secs(60), surface);

        let first = presenter.tick().await.unwrap();
        assert_eq!(first.busy, Duration::ZERO);

        tokio::time::advance(Duration::from_secs(10)).await;
        let second = presenter.tick().await.unwrap();
        assert_eq!(second.busy, Duration::from_secs(10));
        assert_eq!(second.status, UserStatus::Busy);

        // A late tick is credited with the real elapsed time.
        tokio::time::advance(Duration::from_secs(25)).await;
        let third = presenter.tick().await.unwrap();
        assert_eq!(third.busy, Duration::from_secs(35));
        assert_eq!(
            presenter.monitor().total_busy_time_since_rested(),
            Duration::from_secs(35)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_flag_follows_derived_status() {
        let surface = RecordingSurface::default();
        let shown = surface.shown.clone();
        let (mut presenter, interaction, _) =
            presenter(Duration::from_secs(600), Duration::from_secs(60), surface);

        presenter.tick().await.unwrap();
        presenter.tick().await.unwrap();
        interaction.0.set(InteractionStatus::Idle);
        presenter.tick().await.unwrap();

        let flags: Vec<(UserStatus, bool)> = shown
            .lock()
            .unwrap()
            .iter()
            .map(|(report, changed)| (report.status, *changed))
            .collect();
        assert_eq!(
            flags,
            vec![
                (UserStatus::Busy, true),
                (UserStatus::Busy, false),
                (UserStatus::Resting, true),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_warnings_are_rate_limited() {
        let surface = RecordingSurface::default();
        let warnings = surface.warnings.clone();
        let (mut presenter, _, _) =
            presenter(Duration::from_secs(10), Duration::from_secs(30), surface);

        let mut statuses = Vec::new();
        for _ in 0..9 {
            statuses.push(presenter.tick().await.unwrap().status);
            tokio::time::advance(Duration::from_secs(10)).await;
        }

        // Tired from t=20; first warning once more than 30s have passed
        // since startup (t=40), the next one at t=80.
        assert_eq!(statuses[1], UserStatus::Busy);
        assert_eq!(statuses[2], UserStatus::Tired);

        let warnings = warnings.lock().unwrap();
        assert_eq!(warnings.len(), 2);
        assert_eq!(
            warnings[0],
            "Must rest! Please go rest! You haven't rested for 40s."
        );
        assert_eq!(
            warnings[1],
            "Must rest! Please go rest! You haven't rested for 1m 20s."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_warning_is_retried_next_tick() {
        let surface = RecordingSurface {
            fail_warnings: true,
            ..Default::default()
        };
        let warnings = surface.warnings.clone();
        let (mut presenter, _, _) =
            presenter(Duration::from_secs(1), Duration::from_secs(5), surface);

        for _ in 0..4 {
            presenter.tick().await.unwrap();
            tokio::time::advance(Duration::from_secs(10)).await;
        }

        // t=10, 20, 30 are all due because nothing was delivered.
        assert_eq!(warnings.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_warning_while_resting() {
        let surface = RecordingSurface::default();
        let warnings = surface.warnings.clone();
        let (mut presenter, interaction, _) =
            presenter(Duration::from_secs(600), Duration::ZERO, surface);

        interaction.0.set(InteractionStatus::Idle);
        for _ in 0..5 {
            presenter.tick().await.unwrap();
            tokio::time::advance(Duration::from_secs(10)).await;
        }

        assert!(warnings.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_resets_through_presenter() {
        let surface = RecordingSurface::default();
        let (mut presenter, _, tracker) =
            presenter(Duration::from_secs(600), Duration::from_secs(60), surface);

        presenter.tick().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(
            presenter.tick().await.unwrap().busy,
            Duration::from_secs(30)
        );

        tracker.record_resume(std::time::Instant::now());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(presenter.tick().await.unwrap().busy, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_failure_stops_tick() {
        let surface = RecordingSurface::default();
        let shown = surface.shown.clone();
        let policy = RestingPolicy {
            max_busy_time: Duration::from_secs(60),
            resting_time: Duration::from_secs(60),
            initial_status: InteractionStatus::Busy,
        };
        let monitor = RestingMonitor::new(policy, BrokenInteraction, ResumeTracker::new());
        let mut presenter = Presenter::new(monitor, surface, Duration::from_secs(60));

        let err = presenter.tick().await.unwrap_err();
        assert_eq!(err, SignalError::unavailable("fake", "gone"));
        assert!(shown.lock().unwrap().is_empty());

        let err = presenter
            .run(Duration::from_secs(1), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, SignalError::unavailable("fake", "gone"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_spaces_updates() {
        let surface = RecordingSurface::default();
        let (mut presenter, _, _) =
            presenter(Duration::from_secs(600), Duration::from_secs(60), surface);

        let reports = presenter
            .run_ticks(3, Duration::from_secs(10))
            .await
            .unwrap();

        let busy: Vec<Duration> = reports.iter().map(|r| r.busy).collect();
        assert_eq!(
            busy,
            vec![Duration::ZERO, Duration::from_secs(10), Duration::from_secs(20)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let surface = RecordingSurface::default();
        let (mut presenter, _, _) =
            presenter(Duration::from_secs(600), Duration::from_secs(60), surface);

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        presenter
            .run(Duration::from_secs(10), shutdown)
            .await
            .unwrap();
    }
}
