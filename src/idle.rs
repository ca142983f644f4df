//! Interaction signal: busy or idle, from the time since the last input.
//!
//! Observers report how long ago the user last touched an input device;
//! [`IdleStatusProvider`] turns that into an [`InteractionStatus`] using the
//! configured idle threshold.

pub mod logind;
pub mod x11;

use std::env;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::domain::InteractionStatus;
use crate::signal::InteractionSource;
use crate::signal::SignalError;

pub use logind::LogindInputObserver;
pub use x11::X11InputObserver;

/// Source of the time elapsed since the last raw input event.
pub trait InputObserver {
    fn time_since_input(&self) -> Result<Duration, SignalError>;
}

impl<T: InputObserver + ?Sized> InputObserver for Box<T> {
    fn time_since_input(&self) -> Result<Duration, SignalError> {
        (**self).time_since_input()
    }
}

/// Which input observer to use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputBackend {
    /// X11 on a plain X session, logind otherwise (default).
    #[default]
    Auto,
    /// MIT-SCREEN-SAVER extension of the X server.
    X11,
    /// systemd-logind session idle hint.
    Logind,
}

impl InputBackend {
    /// Resolve `Auto` against the environment.
    pub fn resolve(self) -> Self {
        self.resolve_with(|var| env::var(var).ok())
    }

    /// Resolve `Auto` using `var` to look up environment variables.
    ///
    /// Wayland sessions also set `DISPLAY` for `XWayland`, whose idle
    /// counter misses input to native Wayland clients, so they get logind.
    pub fn resolve_with(self, var: impl Fn(&str) -> Option<String>) -> Self {
        if self != Self::Auto {
            return self;
        }

        let wayland = var("XDG_SESSION_TYPE").is_some_and(|t| t.eq_ignore_ascii_case("wayland"))
            || var("WAYLAND_DISPLAY").is_some_and(|d| !d.is_empty());

        if !wayland && var("DISPLAY").is_some_and(|d| !d.is_empty()) {
            Self::X11
        } else {
            Self::Logind
        }
    }

    /// Known accuracy limit of the backend, if any.
    pub fn caveat(self) -> Option<&'static str> {
        match self {
            Self::Logind => Some(
                "logind only reports idle once the desktop's own idle delay has passed, \
                 so time_to_idle is counted from then rather than from the last input",
            ),
            Self::Auto | Self::X11 => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::X11 => "x11",
            Self::Logind => "logind",
        }
    }
}

/// Interaction source backed by an [`InputObserver`].
#[derive(Debug)]
pub struct IdleStatusProvider<O> {
    time_to_idle: Duration,
    observer: O,
}

impl<O: InputObserver> IdleStatusProvider<O> {
    pub fn new(time_to_idle: Duration, observer: O) -> Self {
        Self {
            time_to_idle,
            observer,
        }
    }
}

impl<O: InputObserver> InteractionSource for IdleStatusProvider<O> {
    fn status(&self) -> Result<InteractionStatus, SignalError> {
        let since_input = self.observer.time_since_input()?;

        if since_input > self.time_to_idle {
            Ok(InteractionStatus::Idle)
        } else {
            Ok(InteractionStatus::Busy)
        }
    }
}

/// Environment relevant to picking an input backend.
pub fn diagnostics() -> Vec<String> {
    let mut diags = Vec::new();

    for var in ["DISPLAY", "WAYLAND_DISPLAY", "XDG_SESSION_ID", "XDG_SESSION_TYPE"] {
        match env::var(var) {
            Ok(v) => diags.push(format!("{var}={v}")),
            Err(_) => diags.push(format!("{var}: NOT SET")),
        }
    }

    diags.push(format!(
        "Auto input backend resolves to: {}",
        InputBackend::Auto.resolve().as_str()
    ));

    diags
}
