// ============================================================
// Layer 5 — Synthesis Processor Group + Losses
// ============================================================
// Descriptors for the parts of a model variant whose numerics
// live in the training framework: the harmonic-plus-noise
// processor group and the multi-resolution spectral loss.
// Only their wiring is decided here.

use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, VocoderError};

// ─── HarmonicPlusNoise ────────────────────────────────────────────────────────
/// Converts decoder output splits into audio at `audio_rate`,
/// one `window_secs` window at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonicPlusNoise {
    pub window_secs: f64,
    pub audio_rate:  u32,
    pub input_rate:  f64,
}

impl HarmonicPlusNoise {
    pub fn new(window_secs: f64, audio_rate: u32, input_rate: f64) -> Result<Self> {
        if audio_rate == 0 {
            return Err(VocoderError::Config("audio_rate must be positive".into()));
        }
        let samples = window_secs * audio_rate as f64;
        if samples % 1.0 != 0.0 || samples < 1.0 {
            return Err(VocoderError::Config(format!(
                "window_secs ({window_secs}) * audio_rate ({audio_rate}) must be a positive \
                 whole number of samples, got {samples}"
            )));
        }
        Ok(Self { window_secs, audio_rate, input_rate })
    }

    /// Audio samples produced per window.
    pub fn n_samples(&self) -> usize {
        (self.window_secs * self.audio_rate as f64) as usize
    }

    /// Audio samples per conditioning frame.
    pub fn hop_size(&self) -> f64 {
        self.audio_rate as f64 / self.input_rate
    }

    /// Decoder splits the group consumes, in order.
    pub fn control_keys(&self) -> [&'static str; 3] {
        ["amps", "harmonic_distribution", "noise_magnitudes"]
    }
}

// ─── SpectralLoss ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossType {
    L1,
    L2,
}

/// Multi-resolution STFT magnitude loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralLoss {
    pub fft_sizes:     Vec<usize>,
    pub loss_type:     LossType,
    pub mag_weight:    f64,
    pub logmag_weight: f64,
}

impl Default for SpectralLoss {
    fn default() -> Self {
        Self {
            fft_sizes:     vec![8192, 4096, 2048, 1024, 512, 256, 128],
            loss_type:     LossType::L1,
            mag_weight:    1.0,
            logmag_weight: 1.0,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_sizes() {
        let hpn = HarmonicPlusNoise::new(4.0, 16000, 250.0).unwrap();
        assert_eq!(hpn.n_samples(), 64000);
        assert_eq!(hpn.hop_size(), 64.0);
    }

    #[test]
    fn test_fractional_sample_window_rejected() {
        let err = HarmonicPlusNoise::new(0.00001, 16000, 250.0).unwrap_err();
        assert!(matches!(err, VocoderError::Config(ref m) if m.contains("0.16")));
        assert!(HarmonicPlusNoise::new(0.5, 801, 2.0).is_err());
        assert_eq!(HarmonicPlusNoise::new(0.5, 800, 2.0).unwrap().n_samples(), 400);
    }

    #[test]
    fn test_default_loss() {
        let loss = SpectralLoss::default();
        assert_eq!(loss.fft_sizes.len(), 7);
        assert_eq!(loss.fft_sizes[0], 8192);
        assert_eq!(loss.loss_type, LossType::L1);
    }
}
