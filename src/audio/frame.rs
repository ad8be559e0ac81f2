/// Discord voice capture format: 48kHz interleaved stereo
pub const DISCORD_SAMPLE_RATE: u32 = 48_000;
pub const DISCORD_CHANNELS: u16 = 2;

/// Decoded audio for one speaker (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the speaker's stream started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Frame in the format Discord delivers after opus decode
    pub fn discord(samples: Vec<i16>, timestamp_ms: u64) -> Self {
        Self {
            samples,
            sample_rate: DISCORD_SAMPLE_RATE,
            channels: DISCORD_CHANNELS,
            timestamp_ms,
        }
    }

    /// Playback length of this frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let per_channel = self.samples.len() as u64 / self.channels as u64;
        per_channel * 1000 / self.sample_rate as u64
    }

    /// Little-endian PCM bytes, as carried on the wire
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Rebuild samples from little-endian PCM bytes. A trailing odd byte is dropped.
    pub fn samples_from_pcm_bytes(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect()
    }
}
