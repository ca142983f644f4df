//! Signal contracts consumed by the resting monitor.
//!
//! Both sources are pulled synchronously once per tick. Implementations that
//! are fed by OS callbacks on other threads must make their reads consistent
//! on their own; the monitor only ever takes a snapshot.

use std::time::Instant;

use thiserror::Error;

use crate::domain::InteractionStatus;

/// Reports whether the user is currently busy or idle.
pub trait InteractionSource {
    /// Current raw interaction status.
    ///
    /// Must not block beyond a negligible OS call.
    fn status(&self) -> Result<InteractionStatus, SignalError>;
}

/// Reports the most recent resume-from-sleep event.
pub trait SuspendSource {
    /// Time of the last resume, or `None` if no resume was observed yet.
    ///
    /// Monotonically non-decreasing.
    fn last_resume_time(&self) -> Result<Option<Instant>, SignalError>;
}

impl<T: InteractionSource + ?Sized> InteractionSource for Box<T> {
    fn status(&self) -> Result<InteractionStatus, SignalError> {
        (**self).status()
    }
}

impl<T: SuspendSource + ?Sized> SuspendSource for Box<T> {
    fn last_resume_time(&self) -> Result<Option<Instant>, SignalError> {
        (**self).last_resume_time()
    }
}

/// Errors raised by a signal source that cannot answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    #[error("{source_name} unavailable: {reason}")]
    Unavailable {
        source_name: &'static str,
        reason: String,
    },

    #[error("{source_name} query failed: {reason}")]
    Query {
        source_name: &'static str,
        reason: String,
    },
}

impl SignalError {
    pub fn unavailable(source_name: &'static str, reason: impl ToString) -> Self {
        Self::Unavailable {
            source_name,
            reason: reason.to_string(),
        }
    }

    pub fn query(source_name: &'static str, reason: impl ToString) -> Self {
        Self::Query {
            source_name,
            reason: reason.to_string(),
        }
    }
}
