// ============================================================
// Layer 5 — Model Configuration
// ============================================================
// One flat, serialisable struct holding every knob the model
// builder reads. Every field has a documented default, so a
// partial JSON file (or `{}`) is a valid configuration.
//
//   checkpoint_dir           "."     restore weights from here (null = skip)
//   window_secs              4.0     seconds of audio per model window
//   audio_rate               16000   audio samples per second
//   input_rate               250.0   conditioning frames per second
//   f0_denom                 1.0     f0 normalisation divisor
//   n_harmonic_distribution  60      harmonic amplitude channels
//   n_noise_magnitudes       65      filtered-noise magnitude channels
//   model_type               null    must name a known variant
//   feature_domain           "freq"  f0 scaling (freq | midi)
//   rnn_channels             512     GRU hidden size
//   fc_channels              512     fully connected stack width
//   layers_per_stack         3       layers in each FC stack

use std::path::{Path, PathBuf};
use std::fs;

use serde::{Deserialize, Serialize};

use crate::domain::error::Result;
use crate::ml::preprocessor::FeatureDomain;

pub const DEFAULT_WINDOW_SECS: f64 = 4.0;
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_FRAME_RATE: f64 = 250.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub checkpoint_dir:          Option<PathBuf>,
    pub window_secs:             f64,
    pub audio_rate:              u32,
    pub input_rate:              f64,
    pub f0_denom:                f64,
    pub n_harmonic_distribution: usize,
    pub n_noise_magnitudes:      usize,
    pub model_type:              Option<String>,
    pub feature_domain:          FeatureDomain,
    pub rnn_channels:            usize,
    pub fc_channels:             usize,
    pub layers_per_stack:        usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir:          Some(PathBuf::from(".")),
            window_secs:             DEFAULT_WINDOW_SECS,
            audio_rate:              DEFAULT_SAMPLE_RATE,
            input_rate:              DEFAULT_FRAME_RATE,
            f0_denom:                1.0,
            n_harmonic_distribution: 60,
            n_noise_magnitudes:      65,
            model_type:              None,
            feature_domain:          FeatureDomain::Freq,
            rnn_channels:            512,
            fc_channels:             512,
            layers_per_stack:        3,
        }
    }
}

impl ModelConfig {
    /// Default configuration for a named variant.
    pub fn for_model_type(model_type: impl Into<String>) -> Self {
        Self { model_type: Some(model_type.into()), ..Self::default() }
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| {
            crate::domain::error::VocoderError::Config(format!(
                "cannot parse model config '{}': {e}",
                path.display()
            ))
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let cfg = ModelConfig::from_json("{}").unwrap();
        assert_eq!(cfg, ModelConfig::default());
        assert_eq!(cfg.checkpoint_dir.as_deref(), Some(Path::new(".")));
        assert!(cfg.model_type.is_none());
    }

    #[test]
    fn test_partial_json_overrides() {
        let cfg = ModelConfig::from_json(
            r#"{"model_type": "f0_rnn_fc_hpn_decoder", "input_rate": 100, "checkpoint_dir": null}"#,
        )
        .unwrap();
        assert_eq!(cfg.model_type.as_deref(), Some("f0_rnn_fc_hpn_decoder"));
        assert_eq!(cfg.input_rate, 100.0);
        assert!(cfg.checkpoint_dir.is_none());
        assert_eq!(cfg.n_noise_magnitudes, 65);
    }
}
