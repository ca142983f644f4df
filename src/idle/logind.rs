//! Input time via the systemd-logind `DBus` interface.
//!
//! Polls the session's `IdleHint` and `IdleSinceHint` properties in the
//! background and serves reads from the cached snapshot.

use std::env;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use anyhow::Context;
use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;
use zbus::Connection;

use super::InputObserver;
use crate::signal::SignalError;

/// `DBus` service and path for login1.
const LOGIND_SERVICE: &str = "org.freedesktop.login1";
const LOGIND_PATH: &str = "/org/freedesktop/login1";

const SOURCE: &str = "logind";

/// Idle state of the session as last read from logind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IdleSnapshot {
    idle_hint: bool,
    idle_since: SystemTime,
}

impl IdleSnapshot {
    /// Time since the last input, as of `now`.
    ///
    /// A session that is not idle counts as having input right now.
    fn time_since_input(&self, now: SystemTime) -> Duration {
        if !self.idle_hint {
            return Duration::ZERO;
        }
        now.duration_since(self.idle_since).unwrap_or_default()
    }
}

/// Last poll outcome, shared between the poller and readers.
#[derive(Debug)]
struct PollState {
    snapshot: IdleSnapshot,
    /// Failure of the most recent poll, cleared by the next success.
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct IdleCache(Arc<RwLock<PollState>>);

impl IdleCache {
    fn new(snapshot: IdleSnapshot) -> Self {
        Self(Arc::new(RwLock::new(PollState {
            snapshot,
            error: None,
        })))
    }

    fn record(&self, snapshot: IdleSnapshot) {
        let mut state = self.0.write().unwrap_or_else(PoisonError::into_inner);

        if state.snapshot.idle_hint == snapshot.idle_hint {
            trace!("Idle hint: {}", snapshot.idle_hint);
        } else {
            debug!(
                "Idle hint changed: {} -> {}",
                state.snapshot.idle_hint, snapshot.idle_hint
            );
        }

        state.snapshot = snapshot;
        state.error = None;
    }

    fn record_error(&self, reason: String) {
        let mut state = self.0.write().unwrap_or_else(PoisonError::into_inner);
        state.error = Some(reason);
    }

    fn time_since_input(&self, now: SystemTime) -> Result<Duration, SignalError> {
        let state = self.0.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(ref reason) = state.error {
            return Err(SignalError::query(SOURCE, reason));
        }

        Ok(state.snapshot.time_since_input(now))
    }
}

/// Input observer backed by the logind session idle hint.
#[derive(Debug, Clone)]
pub struct LogindInputObserver {
    conn: Connection,
    session_path: Arc<str>,
    cache: IdleCache,
}

impl LogindInputObserver {
    /// Resolve the current session and take the first snapshot.
    pub async fn connect() -> Result<Self> {
        let conn = Connection::system()
            .await
            .context("Failed to connect to system DBus")?;

        let session_path = resolve_session_path(&conn).await?;
        info!("Resolved session path: {}", session_path);

        let snapshot = read_snapshot(&conn, &session_path).await?;

        Ok(Self {
            conn,
            session_path: session_path.into(),
            cache: IdleCache::new(snapshot),
        })
    }

    /// Refresh the cached snapshot from `DBus`.
    ///
    /// A failure is remembered and reported by the next read.
    pub async fn poll_idle_state(&self) -> Result<()> {
        match read_snapshot(&self.conn, &self.session_path).await {
            Ok(snapshot) => {
                self.cache.record(snapshot);
                Ok(())
            }
            Err(e) => {
                self.cache.record_error(format!("{e:#}"));
                Err(e)
            }
        }
    }

    /// Start background polling task.
    ///
    /// Polls idle state at the specified interval until `shutdown` fires.
    pub fn start_polling(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let observer = self.clone();

        tokio::spawn(async move {
            info!("Logind idle polling started, every {:?}", interval);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }

                if let Err(e) = observer.poll_idle_state().await {
                    warn!("Failed to poll idle state: {:#}", e);
                }
            }

            debug!("Logind idle polling stopped");
        })
    }
}

impl InputObserver for LogindInputObserver {
    fn time_since_input(&self) -> Result<Duration, SignalError> {
        self.cache.time_since_input(SystemTime::now())
    }
}

/// Resolve the session object path for the current session.
async fn resolve_session_path(conn: &Connection) -> Result<String> {
    // First try XDG_SESSION_ID if available
    if let Ok(session_id) = env::var("XDG_SESSION_ID") {
        debug!("Using XDG_SESSION_ID: {}", session_id);

        const MANAGER_INTERFACE: &str = "org.freedesktop.login1.Manager";

        let proxy = zbus::Proxy::new(conn, LOGIND_SERVICE, LOGIND_PATH, MANAGER_INTERFACE)
            .await
            .context("Failed to create Manager proxy")?;

        let path: zbus::zvariant::OwnedObjectPath = proxy
            .call("GetSession", &(&session_id,))
            .await
            .context("GetSession call failed")?;

        return Ok(path.to_string());
    }

    debug!("XDG_SESSION_ID not set, trying to find current session");

    for alias in ["self", "auto"] {
        let path = format!("{LOGIND_PATH}/session/{alias}");
        if get_property(conn, &path, "IdleHint").await.is_ok() {
            return Ok(path);
        }
    }

    anyhow::bail!(
        "Could not resolve session path. Set XDG_SESSION_ID or ensure logind session is available."
    )
}

/// Read `IdleHint` and `IdleSinceHint` from a session.
async fn read_snapshot(conn: &Connection, session_path: &str) -> Result<IdleSnapshot> {
    let idle_hint: bool = get_property(conn, session_path, "IdleHint")
        .await?
        .downcast_ref::<bool>()
        .map_err(|_| anyhow::anyhow!("IdleHint is not a boolean"))?;

    let idle_since_us: u64 = get_property(conn, session_path, "IdleSinceHint")
        .await?
        .downcast_ref::<u64>()
        .map_err(|_| anyhow::anyhow!("IdleSinceHint is not a u64"))?;

    Ok(IdleSnapshot {
        idle_hint,
        idle_since: UNIX_EPOCH + Duration::from_micros(idle_since_us),
    })
}

/// Get a property of the `org.freedesktop.login1.Session` interface.
async fn get_property(
    conn: &Connection,
    session_path: &str,
    name: &str,
) -> Result<zbus::zvariant::OwnedValue> {
    const SESSION_INTERFACE: &str = "org.freedesktop.login1.Session";
    const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

    let proxy = zbus::Proxy::new(conn, LOGIND_SERVICE, session_path, PROPERTIES_INTERFACE)
        .await
        .context("Failed to create Properties proxy")?;

    let value: zbus::zvariant::OwnedValue = proxy
        .call("Get", &(SESSION_INTERFACE, name))
        .await
        .with_context(|| format!("Failed to get {name} property"))?;

    Ok(value)
}
