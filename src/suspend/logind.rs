//! Resume detection via the systemd-logind `PrepareForSleep` signal.

use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use futures_util::Stream;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use zbus::Connection;
use zbus::Proxy;

use super::ResumeTracker;

const LOGIND_SERVICE: &str = "org.freedesktop.login1";
const LOGIND_PATH: &str = "/org/freedesktop/login1";
const MANAGER_INTERFACE: &str = "org.freedesktop.login1.Manager";

/// Subscribe to sleep transitions and record every wake-up in `tracker`.
///
/// Returns once the subscription is in place; the listener runs as a task
/// until `shutdown` fires or the bus closes the stream.
pub async fn listen(tracker: ResumeTracker, shutdown: CancellationToken) -> Result<JoinHandle<()>> {
    let conn = Connection::system()
        .await
        .context("Failed to connect to system DBus")?;

    let proxy = Proxy::new(&conn, LOGIND_SERVICE, LOGIND_PATH, MANAGER_INTERFACE)
        .await
        .context("Failed to create login1 Manager proxy")?;

    let stream = proxy
        .receive_signal("PrepareForSleep")
        .await
        .context("Failed to subscribe to PrepareForSleep")?
        .map(|signal| signal.body().deserialize::<bool>());

    info!("Listening for system suspend events");

    Ok(tokio::spawn(async move {
        // Keep the proxy alive alongside its stream.
        let _proxy = proxy;
        watch_sleep(stream, tracker, shutdown).await;
    }))
}

/// Record wake-ups from a stream of `PrepareForSleep` payloads.
///
/// A stream that ends before `shutdown` marks the tracker as failed.
async fn watch_sleep<S>(mut stream: S, tracker: ResumeTracker, shutdown: CancellationToken)
where
    S: Stream<Item = zbus::Result<bool>> + Unpin,
{
    loop {
        let payload = tokio::select! {
            () = shutdown.cancelled() => break,
            payload = stream.next() => payload,
        };

        let Some(payload) = payload else {
            error!("PrepareForSleep stream ended, suspend detection lost");
            tracker.record_failure("PrepareForSleep stream ended");
            break;
        };

        let going_to_sleep = match payload {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to parse suspend signal: {}", e);
                continue;
            }
        };

        if going_to_sleep {
            info!("System preparing to suspend");
        } else {
            info!("System woke from suspend");
            tracker.record_resume(Instant::now());
        }
    }

    debug!("Suspend listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SuspendSource;
    use futures_util::stream;

    #[tokio::test]
    async fn test_wake_records_resume() {
        let tracker = ResumeTracker::new();
        let before = Instant::now();
        let shutdown = CancellationToken::new();

        // Pending keeps the stream open after the two events.
        let events =
            stream::iter([Ok::<_, zbus::Error>(true), Ok(false)]).chain(stream::pending());
        let task = tokio::spawn(watch_sleep(events, tracker.clone(), shutdown.clone()));

        while tracker.last_resume().is_none() {
            tokio::task::yield_now().await;
        }
        assert!(tracker.last_resume_time().unwrap().unwrap() >= before);

        shutdown.cancel();
        task.await.unwrap();
        assert!(tracker.last_resume_time().is_ok());
    }

    #[tokio::test]
    async fn test_going_to_sleep_alone_records_nothing() {
        let tracker = ResumeTracker::new();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        watch_sleep(
            stream::iter([Ok::<_, zbus::Error>(true)]),
            tracker.clone(),
            shutdown,
        )
        .await;
        assert_eq!(tracker.last_resume(), None);
    }

    #[tokio::test]
    async fn test_ended_stream_fails_tracker() {
        let tracker = ResumeTracker::new();

        watch_sleep(
            stream::iter([Ok::<_, zbus::Error>(true), Ok(false)]),
            tracker.clone(),
            CancellationToken::new(),
        )
        .await;

        assert!(tracker.last_resume().is_some());
        assert!(tracker.last_resume_time().is_err());
    }
}
