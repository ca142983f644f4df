//! Display surfaces: where the presenter sends status and warnings.

use std::io;
use std::io::Stdout;
use std::io::Write;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::notify::NotificationClient;
use crate::notify::NotifyError;
use crate::presenter::StatusReport;

/// Something that renders the derived status to the user.
#[async_trait]
pub trait StatusSurface: Send {
    /// Show the status after a tick. `changed` is set when the derived
    /// status differs from the previous tick's.
    async fn show(&mut self, report: &StatusReport, changed: bool);

    /// Show a rest warning.
    async fn warn(&mut self, title: &str, body: &str) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T: StatusSurface + ?Sized> StatusSurface for Box<T> {
    async fn show(&mut self, report: &StatusReport, changed: bool) {
        (**self).show(report, changed).await;
    }

    async fn warn(&mut self, title: &str, body: &str) -> Result<(), NotifyError> {
        (**self).warn(title, body).await
    }
}

/// Destination for desktop rest warnings.
#[async_trait]
pub trait Notifier: Send {
    async fn notify(&mut self, summary: &str, body: &str) -> Result<(), NotifyError>;
}

#[async_trait]
impl Notifier for NotificationClient {
    async fn notify(&mut self, summary: &str, body: &str) -> Result<(), NotifyError> {
        NotificationClient::notify(self, summary, body).await
    }
}

/// Logs status and optionally writes one JSON line per tick to `out`.
#[derive(Debug)]
pub struct ConsoleSurface<W = Stdout> {
    out: Option<W>,
}

impl ConsoleSurface {
    /// Console surface printing status lines to stdout when `print_status`.
    pub fn new(print_status: bool) -> Self {
        Self {
            out: print_status.then(io::stdout),
        }
    }
}

impl Default for ConsoleSurface {
    fn default() -> Self {
        Self::new(false)
    }
}

impl<W: Write> ConsoleSurface<W> {
    /// Console surface printing status lines to `out`.
    pub fn with_writer(out: W) -> Self {
        Self { out: Some(out) }
    }

    fn print_status(&mut self, report: &StatusReport) {
        let Some(out) = self.out.as_mut() else {
            return;
        };

        let line = match serde_json::to_string(report) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize status: {}", e);
                return;
            }
        };

        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!("Failed to print status: {}", e);
        }
    }
}

#[async_trait]
impl<W: Write + Send> StatusSurface for ConsoleSurface<W> {
    async fn show(&mut self, report: &StatusReport, changed: bool) {
        if changed {
            info!("Status: {} ({})", report.status.as_str(), report.summary());
        } else {
            debug!("Status: {} ({})", report.status.as_str(), report.summary());
        }

        self.print_status(report);
    }

    async fn warn(&mut self, title: &str, body: &str) -> Result<(), NotifyError> {
        warn!("{} {}", title, body);
        Ok(())
    }
}

/// Console output plus desktop notifications for warnings.
#[derive(Debug)]
pub struct DesktopSurface<N = NotificationClient, W = Stdout> {
    console: ConsoleSurface<W>,
    notifier: N,
}

impl<N: Notifier, W: Write + Send> DesktopSurface<N, W> {
    pub fn new(console: ConsoleSurface<W>, notifier: N) -> Self {
        Self { console, notifier }
    }
}

#[async_trait]
impl<N: Notifier, W: Write + Send> StatusSurface for DesktopSurface<N, W> {
    async fn show(&mut self, report: &StatusReport, changed: bool) {
        self.console.show(report, changed).await;
    }

    async fn warn(&mut self, title: &str, body: &str) -> Result<(), NotifyError> {
        self.console.warn(title, body).await?;
        self.notifier.notify(title, body).await
    }
}
