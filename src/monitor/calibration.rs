// Calibration runs
//
// A run collects loudness readings for a fixed window and turns them into
// suggested thresholds. It never warns and is discarded once summarised.

use std::time::Duration;
use tokio::time::Instant;

use super::stats::{CalibrationOutcome, CalibrationProgress, CalibrationSummary};
use crate::voice::SessionKey;

/// Shortest and longest calibration windows accepted from callers
pub const MIN_CALIBRATION_SECS: u64 = 5;
pub const MAX_CALIBRATION_SECS: u64 = 120;

pub fn clamp_calibration_secs(secs: u64) -> u64 {
    secs.clamp(MIN_CALIBRATION_SECS, MAX_CALIBRATION_SECS)
}

/// Readings collected during one calibration window
#[derive(Debug)]
pub struct CalibrationRun {
    key: SessionKey,
    readings: Vec<f64>,
    started_at: Instant,
    duration: Duration,
}

impl CalibrationRun {
    pub fn new(key: SessionKey, duration: Duration, started_at: Instant) -> Self {
        Self {
            key,
            readings: Vec::new(),
            started_at,
            duration,
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn deadline(&self) -> Instant {
        self.started_at + self.duration
    }

    /// Append a reading that already passed the noise floor
    pub fn record(&mut self, loudness: f64) {
        self.readings.push(loudness);
    }

    pub fn readings(&self) -> &[f64] {
        &self.readings
    }

    fn average(&self) -> Option<f64> {
        if self.readings.is_empty() {
            return None;
        }
        Some(self.readings.iter().sum::<f64>() / self.readings.len() as f64)
    }

    fn peak(&self) -> Option<f64> {
        self.readings.iter().copied().reduce(f64::max)
    }

    fn min(&self) -> Option<f64> {
        self.readings.iter().copied().reduce(f64::min)
    }

    /// Readout for the periodic progress update
    pub fn progress(&self, now: Instant) -> CalibrationProgress {
        CalibrationProgress {
            guild_id: self.key.guild_id,
            user_id: self.key.user_id,
            current: self.readings.last().copied(),
            average: self.average(),
            peak: self.peak(),
            readings: self.readings.len(),
            elapsed_secs: now.saturating_duration_since(self.started_at).as_secs(),
            duration_secs: self.duration.as_secs(),
        }
    }

    /// Consume the run and compute the summary
    pub fn finish(self) -> CalibrationOutcome {
        let duration_secs = self.duration.as_secs();

        let (Some(average), Some(peak), Some(min)) = (self.average(), self.peak(), self.min())
        else {
            return CalibrationOutcome::NoAudioDetected { duration_secs };
        };

        CalibrationOutcome::Summary(CalibrationSummary {
            average,
            peak,
            min,
            sensitive: (average * 1.1).round() as u32,
            normal: (average * 1.3).round() as u32,
            relaxed: (peak * 0.9).round() as u32,
            readings: self.readings.len(),
            duration_secs,
        })
    }
}
