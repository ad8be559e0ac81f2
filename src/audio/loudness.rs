// Loudness measurement for decoded voice frames
//
// Loudness is the frame RMS scaled to a 0-100 percentage. The sensitivity
// multiplier lifts normal speech into the middle of the scale; anything that
// would exceed 100 is clamped.

/// Full-scale amplitude of a 16-bit sample
const FULL_SCALE: f64 = i16::MAX as f64;

/// Root-mean-square amplitude of interleaved samples
pub fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();

    (sum_sq / samples.len() as f64).sqrt()
}

/// Converts frames into loudness percentages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessMeter {
    /// Multiplier applied after normalisation (default: 3.0)
    pub sensitivity: f64,
    /// Readings below this percentage count as background noise (default: 5.0)
    pub noise_floor: f64,
}

impl Default for LoudnessMeter {
    fn default() -> Self {
        Self {
            sensitivity: 3.0,
            noise_floor: 5.0,
        }
    }
}

impl LoudnessMeter {
    pub fn new(sensitivity: f64, noise_floor: f64) -> Self {
        Self {
            sensitivity,
            noise_floor,
        }
    }

    /// Loudness of a frame in [0, 100]
    pub fn loudness(&self, samples: &[i16]) -> f64 {
        let level = rms(samples) / FULL_SCALE * 100.0 * self.sensitivity;
        if level.is_nan() {
            return 0.0;
        }
        level.clamp(0.0, 100.0)
    }

    /// Whether a reading is loud enough to count as speech
    pub fn above_noise_floor(&self, loudness: f64) -> bool {
        loudness >= self.noise_floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(rms(&[0; 960]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_of_constant_signal() {
        let r = rms(&[1000, -1000, 1000, -1000]);
        assert!((r - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_loudness_bounds() {
        let meter = LoudnessMeter::default();

        assert_eq!(meter.loudness(&[]), 0.0);
        assert_eq!(meter.loudness(&[0; 1920]), 0.0);
        assert_eq!(meter.loudness(&[i16::MAX; 1920]), 100.0);
        assert_eq!(meter.loudness(&[i16::MIN; 1920]), 100.0);
    }

    #[test]
    fn test_loudness_scales_with_sensitivity() {
        // rms = 3276.7 -> 10% of full scale
        let samples = vec![3277i16; 100];
        let plain = LoudnessMeter::new(1.0, 5.0).loudness(&samples);
        let boosted = LoudnessMeter::default().loudness(&samples);

        assert!((plain - 10.0).abs() < 0.01);
        assert!((boosted - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_noise_floor() {
        let meter = LoudnessMeter::default();
        assert!(!meter.above_noise_floor(4.9));
        assert!(meter.above_noise_floor(5.0));
        assert!(meter.above_noise_floor(42.0));
    }

    #[test]
    fn test_loudness_always_in_range_for_varied_amplitudes() {
        let meter = LoudnessMeter::new(50.0, 5.0);
        for amp in [0i16, 1, 100, 5000, 20000, i16::MAX, i16::MIN, -1] {
            let l = meter.loudness(&[amp, amp / 2, -amp.saturating_abs()]);
            assert!((0.0..=100.0).contains(&l), "amp {} gave {}", amp, l);
        }
    }
}
