//! Volume monitoring session management
//!
//! This module provides the `VolumeSessionManager` that owns:
//! - Per-(guild, user) monitoring sessions and their voice connections
//! - Loudness computation on each decoded frame
//! - Threshold/cooldown warnings with an audible alert
//! - Calibration runs that measure without warning

mod calibration;
mod config;
mod manager;
mod session;
mod stats;
mod warning;

pub use calibration::{
    clamp_calibration_secs, CalibrationRun, MAX_CALIBRATION_SECS, MIN_CALIBRATION_SECS,
};
pub use config::MonitorConfig;
pub use manager::{MonitorOptions, VolumeSessionManager};
pub use stats::{
    CalibrationOutcome, CalibrationProgress, CalibrationSummary, SessionSnapshot, StopSummary,
};
pub use warning::WarningState;
