use serde::Deserialize;
use std::time::Duration;

use crate::audio::{AlertTone, LoudnessMeter};

/// Tunables for monitoring and calibration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Threshold used when a start request does not name one (percent)
    pub default_threshold: u8,

    /// Cooldown used when a start request does not name one
    pub default_cooldown_secs: u64,

    /// Loudness multiplier applied after RMS normalisation
    /// Default: 3.0, chosen so typical speech lands mid-scale
    pub sensitivity: f64,

    /// Calibration readings below this percentage are ignored
    pub noise_floor: f64,

    /// How long a join may take to become ready
    pub connect_timeout_secs: u64,

    /// How long a dropped connection has to start reconnecting
    pub reconnect_grace_secs: u64,

    /// Gap that ends a speaker's audio stream
    pub silence_gap_ms: u64,

    /// Calibration progress readout interval
    pub progress_interval_secs: u64,

    /// Calibration window when a request does not name one
    pub default_calibration_secs: u64,

    /// Alert played on the voice connection when a warning fires
    pub alert: AlertTone,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            default_threshold: 70,
            default_cooldown_secs: 30,
            sensitivity: 3.0,
            noise_floor: 5.0,
            connect_timeout_secs: 30,
            reconnect_grace_secs: 5,
            silence_gap_ms: 100,
            progress_interval_secs: 2,
            default_calibration_secs: 30,
            alert: AlertTone::default(),
        }
    }
}

impl MonitorConfig {
    pub fn meter(&self) -> LoudnessMeter {
        LoudnessMeter::new(self.sensitivity, self.noise_floor)
    }

    pub fn default_cooldown(&self) -> Duration {
        Duration::from_secs(self.default_cooldown_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_secs(self.reconnect_grace_secs)
    }

    pub fn silence_gap(&self) -> Duration {
        Duration::from_millis(self.silence_gap_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs.max(1))
    }
}
