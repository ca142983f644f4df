//! Desktop notifications over the freedesktop `Notify` session-bus API.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use zbus::Connection;
use zbus::zvariant::Value;

/// Application name shown by the notification daemon.
const APP_NAME: &str = "restlittle";

const NOTIFY_SERVICE: &str = "org.freedesktop.Notifications";
const NOTIFY_PATH: &str = "/org/freedesktop/Notifications";
const NOTIFY_INTERFACE: &str = "org.freedesktop.Notifications";

/// Themed icon name for rest warnings.
const WARNING_ICON: &str = "dialog-warning";

/// Critical urgency level of the freedesktop notification hints.
const URGENCY_CRITICAL: u8 = 2;

/// How long a warning bubble stays up, in milliseconds.
const EXPIRE_TIMEOUT_MS: i32 = 5000;

/// Log every Nth failure after the first few.
const ERROR_LOG_RATE_LIMIT: u32 = 10;

/// Errors that can occur while showing a warning.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Session bus unavailable: {0}")]
    BusUnavailable(String),

    #[error("Notify call failed: {0}")]
    CallFailed(String),
}

/// Client for the desktop notification daemon.
#[derive(Debug)]
pub struct NotificationClient {
    conn: Option<Connection>,

    /// Dry run mode: log notifications instead of sending.
    dry_run: bool,

    /// Id of the last bubble, so a new warning replaces the old one.
    last_id: u32,

    /// Count of consecutive failures.
    consecutive_failures: u32,
}

impl NotificationClient {
    /// Connect to the session bus (skipped in dry-run mode).
    pub async fn connect(dry_run: bool) -> Result<Self, NotifyError> {
        let conn = if dry_run {
            None
        } else {
            let conn = Connection::session()
                .await
                .map_err(|e| NotifyError::BusUnavailable(e.to_string()))?;
            info!("Connected to session bus for notifications");
            Some(conn)
        };

        Ok(Self {
            conn,
            dry_run,
            last_id: 0,
            consecutive_failures: 0,
        })
    }

    /// Client that only logs what it would send.
    pub fn dry_run() -> Self {
        Self {
            conn: None,
            dry_run: true,
            last_id: 0,
            consecutive_failures: 0,
        }
    }

    /// Show a critical notification, replacing the previous one.
    pub async fn notify(&mut self, summary: &str, body: &str) -> Result<(), NotifyError> {
        let Some(conn) = self.conn.clone().filter(|_| !self.dry_run) else {
            info!("[DRY RUN] Would notify: {} | {}", summary, body);
            return Ok(());
        };

        debug!("Sending notification: {}", summary);

        match send_notify(&conn, self.last_id, summary, body).await {
            Ok(id) => {
                self.last_id = id;
                self.consecutive_failures = 0;
                Ok(())
            }
            Err(e) => {
                self.consecutive_failures += 1;

                // Rate-limit error logging
                let count = self.consecutive_failures;
                if count <= 5 || count % ERROR_LOG_RATE_LIMIT == 0 {
                    error!("Notification failed ({} in a row): {}", count, e);
                    if count == 5 {
                        warn!(
                            "Rate-limiting notification errors (showing every {}th)",
                            ERROR_LOG_RATE_LIMIT
                        );
                    }
                }

                Err(e)
            }
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

async fn send_notify(
    conn: &Connection,
    replaces_id: u32,
    summary: &str,
    body: &str,
) -> Result<u32, NotifyError> {
    let proxy = zbus::Proxy::new(conn, NOTIFY_SERVICE, NOTIFY_PATH, NOTIFY_INTERFACE)
        .await
        .map_err(|e| NotifyError::BusUnavailable(e.to_string()))?;

    let mut hints: HashMap<&str, Value<'_>> = HashMap::new();
    hints.insert("urgency", Value::from(URGENCY_CRITICAL));

    let actions: Vec<&str> = Vec::new();

    let id: u32 = proxy
        .call(
            "Notify",
            &(
                APP_NAME,
                replaces_id,
                WARNING_ICON,
                summary,
                body,
                actions,
                hints,
                EXPIRE_TIMEOUT_MS,
            ),
        )
        .await
        .map_err(|e| NotifyError::CallFailed(e.to_string()))?;

    Ok(id)
}
