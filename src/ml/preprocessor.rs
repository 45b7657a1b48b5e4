// ============================================================
// Layer 5 — Preprocessors
// ============================================================
// Turn raw conditioning signals [batch, frames] into normalised
// decoder features [batch, frames, 1].
//
//   F0Preprocessor     f0        → f0_scaled
//   OscF0Preprocessor  f0, osc   → f0_sub_scaled, osc_scaled
//
// The frame count of one model window is
//   time_steps = window_secs * input_rate
// and must be a whole number; construction fails otherwise.

use std::collections::BTreeMap;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, VocoderError};

/// Frames per model window.
pub fn time_steps(window_secs: f64, input_rate: f64) -> Result<usize> {
    let steps = window_secs * input_rate;
    if steps % 1.0 != 0.0 {
        return Err(VocoderError::NonIntegralWindow { window_secs, input_rate });
    }
    if !(steps.is_finite() && steps >= 1.0) {
        return Err(VocoderError::Config(format!(
            "window_secs * input_rate must be at least one frame, got {steps}"
        )));
    }
    Ok(steps as usize)
}

/// How f0 is scaled before it reaches the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeatureDomain {
    /// f0 / denom
    #[default]
    Freq,
    /// midi(f0) / 127, zero for unvoiced frames
    Midi,
}

// ─── F0Preprocessor ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct F0Preprocessor {
    pub time_steps:     usize,
    pub denom:          f64,
    pub rate:           f64,
    pub feature_domain: FeatureDomain,
}

impl F0Preprocessor {
    pub fn new(window_secs: f64, input_rate: f64, denom: f64, feature_domain: FeatureDomain) -> Result<Self> {
        check_denom(denom)?;
        Ok(Self { time_steps: time_steps(window_secs, input_rate)?, denom, rate: input_rate, feature_domain })
    }

    /// f0: [batch, time_steps] → f0_scaled: [batch, time_steps, 1]
    pub fn forward<B: Backend>(&self, f0: Tensor<B, 2>) -> Result<Tensor<B, 3>> {
        let [batch, frames] = check_frames(&f0, "f0", self.time_steps)?;
        let scaled = match self.feature_domain {
            FeatureDomain::Freq => f0 / self.denom,
            FeatureDomain::Midi => hz_to_midi(f0) / 127.0,
        };
        Ok(scaled.reshape([batch, frames, 1]))
    }
}

// ─── OscF0Preprocessor ────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct OscF0Preprocessor {
    pub time_steps: usize,
    pub denom:      f64,
    pub rate:       f64,
}

impl OscF0Preprocessor {
    pub fn new(window_secs: f64, input_rate: f64, denom: f64) -> Result<Self> {
        check_denom(denom)?;
        Ok(Self { time_steps: time_steps(window_secs, input_rate)?, denom, rate: input_rate })
    }

    /// f0, osc: [batch, time_steps] → (f0_sub_scaled, osc_scaled),
    /// each [batch, time_steps, 1]. osc in [-1, 1] maps to [0, 1].
    pub fn forward<B: Backend>(&self, f0: Tensor<B, 2>, osc: Tensor<B, 2>) -> Result<(Tensor<B, 3>, Tensor<B, 3>)> {
        let [batch, frames] = check_frames(&f0, "f0", self.time_steps)?;
        check_frames(&osc, "osc", self.time_steps)?;
        let f0_sub_scaled = (f0 / self.denom).reshape([batch, frames, 1]);
        let osc_scaled = ((osc + 1.0) / 2.0).reshape([batch, frames, 1]);
        Ok((f0_sub_scaled, osc_scaled))
    }
}

// ─── Preprocessor ─────────────────────────────────────────────────────────────
/// The preprocessor of a model variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Preprocessor {
    F0(F0Preprocessor),
    OscF0(OscF0Preprocessor),
}

impl Preprocessor {
    /// Raw signals the preprocessor consumes.
    pub fn input_keys(&self) -> &'static [&'static str] {
        match self {
            Preprocessor::F0(_) => &["f0"],
            Preprocessor::OscF0(_) => &["f0", "osc"],
        }
    }

    /// Features handed to the decoder, in decoder input order.
    pub fn feature_keys(&self) -> &'static [&'static str] {
        match self {
            Preprocessor::F0(_) => &["f0_scaled"],
            Preprocessor::OscF0(_) => &["f0_sub_scaled", "osc_scaled"],
        }
    }

    pub fn time_steps(&self) -> usize {
        match self {
            Preprocessor::F0(p) => p.time_steps,
            Preprocessor::OscF0(p) => p.time_steps,
        }
    }

    pub fn forward<B: Backend>(&self, inputs: &BTreeMap<String, Tensor<B, 2>>) -> Result<Vec<Tensor<B, 3>>> {
        let get = |key: &str| {
            inputs
                .get(key)
                .cloned()
                .ok_or_else(|| VocoderError::Config(format!("missing conditioning input '{key}'")))
        };
        match self {
            Preprocessor::F0(p) => Ok(vec![p.forward(get("f0")?)?]),
            Preprocessor::OscF0(p) => {
                let (f0, osc) = p.forward(get("f0")?, get("osc")?)?;
                Ok(vec![f0, osc])
            }
        }
    }
}

fn check_denom(denom: f64) -> Result<()> {
    if denom == 0.0 || !denom.is_finite() {
        return Err(VocoderError::Config(format!("f0_denom must be finite and non-zero, got {denom}")));
    }
    Ok(())
}

fn check_frames<B: Backend>(signal: &Tensor<B, 2>, name: &str, expected: usize) -> Result<[usize; 2]> {
    let dims = signal.dims();
    if dims[1] != expected {
        return Err(VocoderError::Config(format!(
            "'{name}' has {} frames per window, expected {expected}",
            dims[1]
        )));
    }
    Ok(dims)
}

/// 12 * log2(f / 440) + 69, with non-positive frequencies mapped to 0.
fn hz_to_midi<B: Backend>(f0: Tensor<B, 2>) -> Tensor<B, 2> {
    let unvoiced = f0.clone().lower_equal_elem(0.0);
    let notes = (f0.clamp_min(1e-5) / 440.0).log() * (12.0 / std::f64::consts::LN_2) + 69.0;
    notes.mask_fill(unvoiced, 0.0)
}
