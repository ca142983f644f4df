//! restlittle - Systemd user daemon that reminds you to rest.
//!
//! Tracks alternating busy and idle periods, derives a resting / busy /
//! tired status, and warns when busy time runs past the configured maximum
//! without enough rest in between.

pub mod config;
pub mod domain;
pub mod idle;
pub mod monitor;
pub mod notify;
pub mod presenter;
pub mod signal;
pub mod surface;
pub mod suspend;
pub mod throttle;
