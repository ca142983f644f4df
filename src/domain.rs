//! Status types shared by the monitor, its signal sources and the presenter.

use serde::Deserialize;
use serde::Serialize;

/// Raw signal: did the user touch an input device recently?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionStatus {
    Busy,
    #[default]
    Idle,
}

impl InteractionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Busy => "busy",
            Self::Idle => "idle",
        }
    }
}

/// Derived wellbeing status.
///
/// Never stored on its own; always projected from the monitor's counters
/// and the last observed [`InteractionStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Idle and not (yet) tired.
    Resting,
    /// Working.
    Busy,
    /// Busy for longer than allowed without enough rest in between.
    Tired,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resting => "resting",
            Self::Busy => "busy",
            Self::Tired => "tired",
        }
    }
}
