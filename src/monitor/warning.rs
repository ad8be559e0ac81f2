use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// Threshold and cooldown bookkeeping for one session
///
/// `last_warning_at` and `warning_count` only move forward.
#[derive(Debug, Clone)]
pub struct WarningState {
    threshold: u8,
    cooldown: Duration,
    last_warning_at: Option<Instant>,
    last_warning_wall: Option<DateTime<Utc>>,
    warning_count: u64,
}

impl WarningState {
    pub fn new(threshold: u8, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            last_warning_at: None,
            last_warning_wall: None,
            warning_count: 0,
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn warning_count(&self) -> u64 {
        self.warning_count
    }

    pub fn last_warning_wall(&self) -> Option<DateTime<Utc>> {
        self.last_warning_wall
    }

    /// Record a reading; returns true when it fires a warning
    pub fn observe(&mut self, loudness: f64, now: Instant) -> bool {
        if loudness <= self.threshold as f64 {
            return false;
        }

        let cooled_down = match self.last_warning_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
        };
        if !cooled_down {
            return false;
        }

        self.last_warning_at = Some(now);
        self.last_warning_wall = Some(Utc::now());
        self.warning_count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(t0: Instant, secs: u64) -> Instant {
        t0 + Duration::from_secs(secs)
    }

    #[test]
    fn test_quiet_readings_never_warn() {
        let mut state = WarningState::new(70, Duration::from_secs(30));
        let t0 = Instant::now();

        assert!(!state.observe(10.0, t0));
        assert!(!state.observe(70.0, t0));
        assert_eq!(state.warning_count(), 0);
        assert!(state.last_warning_wall().is_none());
    }

    #[test]
    fn test_spikes_inside_cooldown_warn_once() {
        let mut state = WarningState::new(70, Duration::from_secs(30));
        let t0 = Instant::now();

        assert!(state.observe(85.0, t0));
        assert!(!state.observe(85.0, at(t0, 10)));
        assert_eq!(state.warning_count(), 1);
    }

    #[test]
    fn test_spikes_outside_cooldown_warn_twice() {
        let mut state = WarningState::new(70, Duration::from_secs(30));
        let t0 = Instant::now();

        assert!(state.observe(85.0, t0));
        assert!(state.observe(85.0, at(t0, 31)));
        assert_eq!(state.warning_count(), 2);
    }

    #[test]
    fn test_cooldown_boundary_is_exclusive() {
        let mut state = WarningState::new(70, Duration::from_secs(30));
        let t0 = Instant::now();

        assert!(state.observe(85.0, t0));
        assert!(!state.observe(85.0, at(t0, 30)));
    }

    #[test]
    fn test_sequence_of_five_spikes() {
        let mut state = WarningState::new(70, Duration::from_secs(30));
        let t0 = Instant::now();

        let fired: Vec<u64> = [0, 1, 2, 31, 32]
            .into_iter()
            .filter(|&s| state.observe(85.0, at(t0, s)))
            .collect();

        assert_eq!(fired, vec![0, 31]);
        assert_eq!(state.warning_count(), 2);
    }
}
