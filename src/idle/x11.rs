//! Input time from the X server's MIT-SCREEN-SAVER extension.

use std::time::Duration;

use tracing::info;
use tracing::trace;
use x11rb::connection::Connection;
use x11rb::connection::RequestConnection;
use x11rb::protocol::screensaver;
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

use super::InputObserver;
use crate::signal::SignalError;

const SOURCE: &str = "x11";

/// Reads `ms_since_user_input` for the root window of the default screen.
pub struct X11InputObserver {
    conn: RustConnection,
    root: Window,
}

impl X11InputObserver {
    /// Connect to the display named by `DISPLAY`.
    pub fn connect() -> Result<Self, SignalError> {
        let (conn, screen_num) =
            x11rb::connect(None).map_err(|e| SignalError::unavailable(SOURCE, e))?;

        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| {
                SignalError::unavailable(SOURCE, format!("screen {screen_num} not found"))
            })?;

        let extension = conn
            .extension_information(screensaver::X11_EXTENSION_NAME)
            .map_err(|e| SignalError::unavailable(SOURCE, e))?;
        if extension.is_none() {
            return Err(SignalError::unavailable(
                SOURCE,
                "MIT-SCREEN-SAVER extension not supported by the X server",
            ));
        }

        info!("Connected to X server, screen {}", screen_num);

        Ok(Self { conn, root })
    }
}

impl InputObserver for X11InputObserver {
    fn time_since_input(&self) -> Result<Duration, SignalError> {
        let info = screensaver::query_info(&self.conn, self.root)
            .map_err(|e| SignalError::query(SOURCE, e))?
            .reply()
            .map_err(|e| SignalError::query(SOURCE, e))?;

        trace!("X11 ms since user input: {}", info.ms_since_user_input);

        Ok(Duration::from_millis(u64::from(info.ms_since_user_input)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires a running X server"]
    fn test_query_idle_time() {
        let observer = X11InputObserver::connect().unwrap();
        let first = observer.time_since_input().unwrap();
        assert!(first < Duration::from_secs(60 * 60 * 24 * 365));
    }
}
