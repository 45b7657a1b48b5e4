// ============================================================
// Layer 5 — Model Builder
// ============================================================
// Turns a ModelConfig into a ready HpnAutoencoder:
//
//   1. resolve the variant named by `model_type`
//   2. construct it from the config's parameters
//   3. restore weights from `checkpoint_dir` when one is set
//
// Construction errors (bad window, unknown type) surface before
// any checkpoint is read.

use std::path::Path;

use burn::prelude::*;

use crate::domain::error::{Result, VocoderError};
use crate::ml::config::ModelConfig;
use crate::ml::model::{HpnAutoencoder, ModelType, VariantParams};

#[derive(Debug, Clone)]
pub struct ModelBuilder {
    config: ModelConfig,
}

impl ModelBuilder {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// None when unset or empty; an empty path means "do not restore".
    pub fn checkpoint_dir(&self) -> Option<&Path> {
        self.config
            .checkpoint_dir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    pub fn window_secs(&self) -> f64 {
        self.config.window_secs
    }

    pub fn audio_rate(&self) -> u32 {
        self.config.audio_rate
    }

    pub fn input_rate(&self) -> f64 {
        self.config.input_rate
    }

    pub fn f0_denom(&self) -> f64 {
        self.config.f0_denom
    }

    pub fn n_harmonic_distribution(&self) -> usize {
        self.config.n_harmonic_distribution
    }

    pub fn n_noise_magnitudes(&self) -> usize {
        self.config.n_noise_magnitudes
    }

    pub fn model_type(&self) -> Option<&str> {
        self.config.model_type.as_deref()
    }

    fn params(&self) -> VariantParams {
        variant_params(&self.config)
    }

    /// Build the configured variant and, if `checkpoint_dir` is set,
    /// restore its latest weights.
    pub fn build<B: Backend>(&self, device: &B::Device) -> Result<HpnAutoencoder<B>> {
        let model_type: ModelType = match self.model_type() {
            None | Some("") => return Err(VocoderError::Config("model_type must be set.".into())),
            Some(name) => name.parse()?,
        };

        let params = self.params();
        let model = match model_type {
            ModelType::F0RnnFcHpnDecoder => HpnAutoencoder::f0_rnn_fc_hpn_decoder(&params, None, device)?,
            ModelType::OscF0RnnFcHpnDecoder => {
                HpnAutoencoder::osc_f0_rnn_fc_hpn_decoder(&params, None, device)?
            }
        };

        match self.checkpoint_dir() {
            Some(dir) => model.restore(dir, device),
            None => Ok(model),
        }
    }

    /// Build the f0 variant straight from its rates, bypassing any
    /// ModelConfig. Every other parameter takes its default and no
    /// checkpoint is restored. `f0_denom` defaults to 1.0.
    #[deprecated(note = "set model_type = \"f0_rnn_fc_hpn_decoder\" and call build()")]
    pub fn create_f0_rnn_fc_hpn_decoder<B: Backend>(
        window_secs: f64,
        audio_rate: u32,
        input_rate: f64,
        f0_denom: Option<f64>,
        device: &B::Device,
    ) -> Result<HpnAutoencoder<B>> {
        let defaults = ModelConfig::default();
        let config = ModelConfig {
            window_secs,
            audio_rate,
            input_rate,
            f0_denom: f0_denom.unwrap_or(defaults.f0_denom),
            ..defaults
        };
        HpnAutoencoder::f0_rnn_fc_hpn_decoder(&variant_params(&config), None, device)
    }
}

fn variant_params(c: &ModelConfig) -> VariantParams {
    VariantParams {
        window_secs:             c.window_secs,
        audio_rate:              c.audio_rate,
        input_rate:              c.input_rate,
        f0_denom:                c.f0_denom,
        n_harmonic_distribution: c.n_harmonic_distribution,
        n_noise_magnitudes:      c.n_noise_magnitudes,
        feature_domain:          c.feature_domain,
        rnn_channels:            c.rnn_channels,
        fc_channels:             c.fc_channels,
        layers_per_stack:        c.layers_per_stack,
    }
}
