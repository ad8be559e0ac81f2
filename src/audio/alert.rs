// Audible alert synthesis
//
// The alert is two short sine beeps separated by silence, rendered as
// interleaved 16-bit PCM so it can be handed straight to a voice player.
// Each beep fades in and out to avoid clicks at the edges.

use serde::Deserialize;
use std::f64::consts::PI;

use super::frame::{DISCORD_CHANNELS, DISCORD_SAMPLE_RATE};

/// Parameters for the two-tone alert
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertTone {
    /// Tone frequency in Hz (default: 800)
    pub frequency_hz: f64,
    /// Length of each beep in milliseconds (default: 150)
    pub tone_ms: u32,
    /// Silence between beeps in milliseconds (default: 100)
    pub gap_ms: u32,
    /// Peak amplitude as a fraction of full scale (default: 0.3)
    pub amplitude: f64,
    /// Fade-in/fade-out length in milliseconds (default: 10)
    pub fade_ms: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AlertTone {
    fn default() -> Self {
        Self {
            frequency_hz: 800.0,
            tone_ms: 150,
            gap_ms: 100,
            amplitude: 0.3,
            fade_ms: 10,
            sample_rate: DISCORD_SAMPLE_RATE,
            channels: DISCORD_CHANNELS,
        }
    }
}

impl AlertTone {
    /// Render the alert as interleaved PCM
    pub fn synthesize(&self) -> Vec<i16> {
        let tone = self.beep();
        let gap_frames = self.frames_for(self.gap_ms);
        let channels = self.channels.max(1) as usize;

        let mut pcm = Vec::with_capacity((tone.len() * 2 + gap_frames) * channels);
        for chunk in [&tone[..], &vec![0i16; gap_frames][..], &tone[..]] {
            for &sample in chunk {
                pcm.extend(std::iter::repeat(sample).take(channels));
            }
        }

        pcm
    }

    /// Total alert length in milliseconds
    pub fn duration_ms(&self) -> u32 {
        self.tone_ms * 2 + self.gap_ms
    }

    /// One mono beep with a linear attack/release envelope
    fn beep(&self) -> Vec<i16> {
        let frames = self.frames_for(self.tone_ms);
        let fade = self.frames_for(self.fade_ms).min(frames / 2).max(1);
        let peak = self.amplitude.clamp(0.0, 1.0) * i16::MAX as f64;
        let step = 2.0 * PI * self.frequency_hz / self.sample_rate as f64;

        (0..frames)
            .map(|i| {
                let envelope = if i < fade {
                    i as f64 / fade as f64
                } else if i >= frames - fade {
                    (frames - 1 - i) as f64 / fade as f64
                } else {
                    1.0
                };
                (peak * envelope * (step * i as f64).sin()).round() as i16
            })
            .collect()
    }

    fn frames_for(&self, ms: u32) -> usize {
        (self.sample_rate as u64 * ms as u64 / 1000) as usize
    }
}
