// ============================================================
// Layer 5 — Model Variants
// ============================================================
// An HpnAutoencoder is four parts wired together:
//
//   preprocessor     raw f0 (+ osc) → scaled features
//   decoder          features → amps / harmonics / noise
//   processor_group  harmonic-plus-noise synthesis settings
//   losses           spectral losses (default: 7 FFT sizes)
//
// Variants:
//   f0_rnn_fc_hpn_decoder      f0 only
//   osc_f0_rnn_fc_hpn_decoder  f0 + oscillator signal
//
// No audio is computed here; only the decoder runs on Burn.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use burn::prelude::*;

use crate::domain::error::{Result, VocoderError};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::decoder::{DecoderOutput, RnnFcDecoder, RnnFcDecoderConfig};
use crate::ml::preprocessor::{F0Preprocessor, FeatureDomain, OscF0Preprocessor, Preprocessor};
use crate::ml::processors::{HarmonicPlusNoise, SpectralLoss};

// ─── ModelType ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    F0RnnFcHpnDecoder,
    OscF0RnnFcHpnDecoder,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::F0RnnFcHpnDecoder => "f0_rnn_fc_hpn_decoder",
            ModelType::OscF0RnnFcHpnDecoder => "osc_f0_rnn_fc_hpn_decoder",
        }
    }
}

impl FromStr for ModelType {
    type Err = VocoderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "f0_rnn_fc_hpn_decoder" => Ok(ModelType::F0RnnFcHpnDecoder),
            "osc_f0_rnn_fc_hpn_decoder" => Ok(ModelType::OscF0RnnFcHpnDecoder),
            other => Err(VocoderError::UnknownModelType(other.to_string())),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── VariantParams ────────────────────────────────────────────────────────────
/// Resolved construction parameters shared by every variant.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantParams {
    pub window_secs:             f64,
    pub audio_rate:              u32,
    pub input_rate:              f64,
    pub f0_denom:                f64,
    pub n_harmonic_distribution: usize,
    pub n_noise_magnitudes:      usize,
    pub feature_domain:          FeatureDomain,
    pub rnn_channels:            usize,
    pub fc_channels:             usize,
    pub layers_per_stack:        usize,
}

impl VariantParams {
    fn decoder_config(&self, n_inputs: usize) -> RnnFcDecoderConfig {
        RnnFcDecoderConfig::new(n_inputs)
            .with_rnn_channels(self.rnn_channels)
            .with_ch(self.fc_channels)
            .with_layers_per_stack(self.layers_per_stack)
            .with_n_harmonic_distribution(self.n_harmonic_distribution)
            .with_n_noise_magnitudes(self.n_noise_magnitudes)
    }
}

// ─── HpnAutoencoder ───────────────────────────────────────────────────────────
#[derive(Debug)]
pub struct HpnAutoencoder<B: Backend> {
    pub model_type:      ModelType,
    pub preprocessor:    Preprocessor,
    pub decoder:         RnnFcDecoder<B>,
    pub processor_group: HarmonicPlusNoise,
    pub losses:          Vec<SpectralLoss>,
}

impl<B: Backend> HpnAutoencoder<B> {
    /// f0 → RNN-FC decoder → harmonic-plus-noise.
    pub fn f0_rnn_fc_hpn_decoder(
        params: &VariantParams,
        losses: Option<Vec<SpectralLoss>>,
        device: &B::Device,
    ) -> Result<Self> {
        let preprocessor = F0Preprocessor::new(
            params.window_secs,
            params.input_rate,
            params.f0_denom,
            params.feature_domain,
        )?;
        Self::assemble(ModelType::F0RnnFcHpnDecoder, Preprocessor::F0(preprocessor), params, losses, device)
    }

    /// (f0, osc) → multi-input RNN-FC decoder → harmonic-plus-noise.
    pub fn osc_f0_rnn_fc_hpn_decoder(
        params: &VariantParams,
        losses: Option<Vec<SpectralLoss>>,
        device: &B::Device,
    ) -> Result<Self> {
        let preprocessor = OscF0Preprocessor::new(params.window_secs, params.input_rate, params.f0_denom)?;
        Self::assemble(ModelType::OscF0RnnFcHpnDecoder, Preprocessor::OscF0(preprocessor), params, losses, device)
    }

    fn assemble(
        model_type: ModelType,
        preprocessor: Preprocessor,
        params: &VariantParams,
        losses: Option<Vec<SpectralLoss>>,
        device: &B::Device,
    ) -> Result<Self> {
        let processor_group = HarmonicPlusNoise::new(params.window_secs, params.audio_rate, params.input_rate)?;
        let decoder = params
            .decoder_config(preprocessor.feature_keys().len())
            .init(device);
        let losses = losses.unwrap_or_else(|| vec![SpectralLoss::default()]);

        tracing::info!(
            "Assembled {} (time_steps={}, n_samples={}, decoder inputs={:?})",
            model_type,
            preprocessor.time_steps(),
            processor_group.n_samples(),
            preprocessor.feature_keys(),
        );
        Ok(Self { model_type, preprocessor, decoder, processor_group, losses })
    }

    /// Preprocess raw conditioning signals and run the decoder.
    /// inputs: name → [batch, time_steps]
    pub fn decode(&self, inputs: &BTreeMap<String, Tensor<B, 2>>) -> Result<DecoderOutput<B>> {
        let features = self.preprocessor.forward(inputs)?;
        Ok(self.decoder.forward(features))
    }

    /// Load the latest checkpoint in `dir` into the decoder.
    pub fn restore(mut self, dir: &Path, device: &B::Device) -> Result<Self> {
        let manager = CheckpointManager::new(dir);
        self.decoder = manager.load_weights(self.decoder, device)?;
        tracing::info!("Restored {} from '{}'", self.model_type, dir.display());
        Ok(self)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn params() -> VariantParams {
        VariantParams {
            window_secs:             1.0,
            audio_rate:              800,
            input_rate:              5.0,
            f0_denom:                100.0,
            n_harmonic_distribution: 4,
            n_noise_magnitudes:      3,
            feature_domain:          FeatureDomain::Freq,
            rnn_channels:            8,
            fc_channels:             4,
            layers_per_stack:        1,
        }
    }

    #[test]
    fn test_model_type_names() {
        assert_eq!("f0_rnn_fc_hpn_decoder".parse::<ModelType>().unwrap(), ModelType::F0RnnFcHpnDecoder);
        assert!(matches!("bogus".parse::<ModelType>(), Err(VocoderError::UnknownModelType(_))));
    }

    #[test]
    fn test_f0_variant_wiring() {
        let model = HpnAutoencoder::<B>::f0_rnn_fc_hpn_decoder(&params(), None, &Default::default()).unwrap();
        assert_eq!(model.preprocessor.time_steps(), 5);
        assert_eq!(model.decoder.n_inputs(), 1);
        assert_eq!(model.processor_group.n_samples(), 800);
        assert_eq!(model.losses, vec![SpectralLoss::default()]);
    }

    #[test]
    fn test_custom_losses_kept() {
        let losses = vec![SpectralLoss { fft_sizes: vec![64], ..Default::default() }];
        let model = HpnAutoencoder::<B>::f0_rnn_fc_hpn_decoder(&params(), Some(losses.clone()), &Default::default())
            .unwrap();
        assert_eq!(model.losses, losses);
    }

    #[test]
    fn test_osc_variant_decodes() {
        let device = Default::default();
        let model = HpnAutoencoder::<B>::osc_f0_rnn_fc_hpn_decoder(&params(), None, &device).unwrap();
        assert_eq!(model.decoder.n_inputs(), 2);

        let mut inputs = BTreeMap::new();
        inputs.insert("f0".to_string(), Tensor::<B, 2>::ones([3, 5], &device) * 220.0);
        inputs.insert("osc".to_string(), Tensor::<B, 2>::zeros([3, 5], &device));
        let out = model.decode(&inputs).unwrap();
        assert_eq!(out.harmonic_distribution.dims(), [3, 5, 4]);
    }

    #[test]
    fn test_non_integral_window_fails() {
        let mut p = params();
        p.window_secs = 1.5;
        p.input_rate = 3.0;
        assert!(matches!(
            HpnAutoencoder::<B>::f0_rnn_fc_hpn_decoder(&p, None, &Default::default()),
            Err(VocoderError::NonIntegralWindow { .. })
        ));
    }
}
