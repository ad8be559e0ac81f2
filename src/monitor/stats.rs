use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::voice::{ChannelId, GuildId, UserId};

/// Read-only view of an active monitoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub guild_id: GuildId,
    pub user_id: UserId,

    /// Voice channel being monitored
    pub voice_channel_id: ChannelId,

    /// Text channel warnings are posted to
    pub text_channel_id: ChannelId,

    /// Loudness percentage that triggers a warning
    pub threshold: u8,

    /// Minimum seconds between warnings
    pub cooldown_secs: u64,

    /// Warnings fired so far
    pub warning_count: u64,

    /// When the last warning fired, if ever
    pub last_warning_at: Option<DateTime<Utc>>,

    /// When monitoring started
    pub started_at: DateTime<Utc>,

    /// Time since monitoring started, in seconds
    pub elapsed_secs: f64,
}

/// Returned when a session is stopped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopSummary {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub warning_count: u64,
    pub elapsed_secs: f64,
}

/// Intermediate calibration readout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationProgress {
    pub guild_id: GuildId,
    pub user_id: UserId,

    /// Most recent accepted reading
    pub current: Option<f64>,
    pub average: Option<f64>,
    pub peak: Option<f64>,

    /// Accepted readings so far
    pub readings: usize,

    pub elapsed_secs: u64,
    pub duration_secs: u64,
}

/// Final calibration figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSummary {
    pub average: f64,
    pub peak: f64,
    pub min: f64,

    /// round(average * 1.1)
    pub sensitive: u32,
    /// round(average * 1.3)
    pub normal: u32,
    /// round(peak * 0.9)
    pub relaxed: u32,

    pub readings: usize,
    pub duration_secs: u64,
}

/// Result of a calibration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CalibrationOutcome {
    Summary(CalibrationSummary),
    /// Nothing above the noise floor was heard
    NoAudioDetected { duration_secs: u64 },
}
