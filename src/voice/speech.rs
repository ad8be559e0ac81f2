// Per-speaker audio subscription
//
// A subscription opens when the target user starts speaking and closes once
// no frame has arrived for the silence gap. Frames outside an open
// subscription, or from anyone else, are dropped.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::types::{UserId, VoiceEvent};
use crate::audio::AudioFrame;

/// Default end-of-speech gap
pub const DEFAULT_SILENCE_GAP: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct SpeechSubscription {
    user_id: UserId,
    silence_gap: Duration,
    /// Time of the last accepted frame (or the speaking event) while open
    last_activity: Option<Instant>,
    streams_opened: u64,
}

impl SpeechSubscription {
    pub fn new(user_id: UserId, silence_gap: Duration) -> Self {
        Self {
            user_id,
            silence_gap,
            last_activity: None,
            streams_opened: 0,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn is_open(&self) -> bool {
        self.last_activity.is_some()
    }

    /// Number of speech streams opened so far
    pub fn streams_opened(&self) -> u64 {
        self.streams_opened
    }

    /// When the open stream will end if nothing else arrives
    pub fn deadline(&self) -> Option<Instant> {
        self.last_activity.map(|t| t + self.silence_gap)
    }

    /// Close the stream if the silence gap has elapsed
    pub fn expire(&mut self, now: Instant) {
        if let Some(deadline) = self.deadline() {
            if now > deadline {
                debug!("Speech stream for user {} ended", self.user_id);
                self.last_activity = None;
            }
        }
    }

    /// Feed a connection event; returns the frame if it belongs to the open stream
    pub fn accept(&mut self, event: VoiceEvent, now: Instant) -> Option<AudioFrame> {
        self.expire(now);

        match event {
            VoiceEvent::Speaking { user_id } if user_id == self.user_id => {
                if self.last_activity.is_none() {
                    debug!("Speech stream for user {} started", self.user_id);
                    self.streams_opened += 1;
                }
                self.last_activity = Some(now);
                None
            }
            VoiceEvent::Audio { user_id, frame } if user_id == self.user_id => {
                if self.last_activity.is_some() {
                    self.last_activity = Some(now);
                    Some(frame)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(user: u64) -> VoiceEvent {
        VoiceEvent::Audio {
            user_id: UserId(user),
            frame: AudioFrame::discord(vec![100; 1920], 0),
        }
    }

    #[test]
    fn test_frames_before_speaking_are_dropped() {
        let mut sub = SpeechSubscription::new(UserId(9), DEFAULT_SILENCE_GAP);
        let now = Instant::now();

        assert!(sub.accept(audio(9), now).is_none());
        assert!(!sub.is_open());
    }

    #[test]
    fn test_other_users_are_ignored() {
        let mut sub = SpeechSubscription::new(UserId(9), DEFAULT_SILENCE_GAP);
        let now = Instant::now();

        sub.accept(VoiceEvent::Speaking { user_id: UserId(4) }, now);
        assert!(!sub.is_open());

        sub.accept(VoiceEvent::Speaking { user_id: UserId(9) }, now);
        assert!(sub.accept(audio(4), now).is_none());
        assert!(sub.accept(audio(9), now).is_some());
    }

    #[test]
    fn test_stream_closes_after_silence_gap() {
        let mut sub = SpeechSubscription::new(UserId(9), DEFAULT_SILENCE_GAP);
        let t0 = Instant::now();

        sub.accept(VoiceEvent::Speaking { user_id: UserId(9) }, t0);
        assert!(sub.accept(audio(9), t0 + Duration::from_millis(20)).is_some());
        assert!(sub.accept(audio(9), t0 + Duration::from_millis(110)).is_some());

        // 150ms after the last frame
        assert!(sub.accept(audio(9), t0 + Duration::from_millis(260)).is_none());
        assert!(!sub.is_open());

        sub.accept(VoiceEvent::Speaking { user_id: UserId(9) }, t0 + Duration::from_millis(300));
        assert!(sub.accept(audio(9), t0 + Duration::from_millis(320)).is_some());
        assert_eq!(sub.streams_opened(), 2);
    }
}
