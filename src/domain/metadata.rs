// ============================================================
// Layer 3 — Dataset Metadata
// ============================================================
// The descriptor written at data-generation time next to the
// record files (`<data_dir>/metadata.pickle`).
//
// Fields:
//   audio_rate     — audio samples per second
//   input_rate     — conditioning frames per second
//   input_keys     — conditioning signal names (default ["f0"])
//   n_samples      — total example count, plus optional per-split counts
//   example_secs   — duration of one example
//   hop_secs       — hop between consecutive examples
//
// Derived:
//   audio_length = example_secs * audio_rate
//   input_length = example_secs * input_rate
//
// Both derived lengths must be whole numbers, otherwise the
// fixed-length record parser cannot be built.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::error::{Result, VocoderError};
use crate::domain::example::FeatureSchema;
use crate::domain::split::Split;

/// File name of the descriptor inside a data directory.
pub const METADATA_FILE: &str = "metadata.pickle";

const INTEGRAL_TOLERANCE: f64 = 1e-6;

fn default_input_keys() -> Vec<String> {
    vec!["f0".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(deserialize_with = "number_as_f64")]
    pub audio_rate: f64,
    #[serde(deserialize_with = "number_as_f64")]
    pub input_rate: f64,
    #[serde(default = "default_input_keys")]
    pub input_keys: Vec<String>,
    pub n_samples: usize,
    #[serde(default)]
    pub n_samples_train: Option<usize>,
    #[serde(default)]
    pub n_samples_valid: Option<usize>,
    #[serde(default)]
    pub n_samples_test: Option<usize>,
    #[serde(deserialize_with = "number_as_f64")]
    pub example_secs: f64,
    #[serde(deserialize_with = "number_as_f64")]
    pub hop_secs: f64,
}

impl Metadata {
    /// Decode a pickled descriptor and validate it.
    pub fn from_pickle(bytes: &[u8]) -> Result<Self> {
        let metadata: Metadata = serde_pickle::from_slice(bytes, serde_pickle::DeOptions::new())
            .map_err(|e| VocoderError::Metadata(format!("cannot unpickle metadata: {e}")))?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Pickle the descriptor (protocol 3, readable by Python).
    pub fn to_pickle(&self) -> Result<Vec<u8>> {
        serde_pickle::to_vec(self, serde_pickle::SerOptions::new())
            .map_err(|e| VocoderError::Metadata(format!("cannot pickle metadata: {e}")))
    }

    /// Check rates and durations are positive and that both
    /// derived lengths are whole numbers.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("audio_rate", self.audio_rate),
            ("input_rate", self.input_rate),
            ("example_secs", self.example_secs),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(VocoderError::Metadata(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.input_keys.is_empty() {
            return Err(VocoderError::Metadata("input_keys must not be empty".into()));
        }
        whole(self.example_secs * self.audio_rate, "audio_length")?;
        whole(self.example_secs * self.input_rate, "input_length")?;
        Ok(())
    }

    /// Number of audio samples in one example.
    pub fn audio_length(&self) -> usize {
        (self.example_secs * self.audio_rate).round() as usize
    }

    /// Number of conditioning frames in one example.
    pub fn input_length(&self) -> usize {
        (self.example_secs * self.input_rate).round() as usize
    }

    /// Example count recorded for a split, if present.
    pub fn split_count(&self, split: Split) -> Option<usize> {
        match split {
            Split::All => Some(self.n_samples),
            Split::Train => self.n_samples_train,
            Split::Valid => self.n_samples_valid,
            Split::Test => self.n_samples_test,
        }
    }

    /// Fixed-length schema: "audio" first, then every input key.
    pub fn feature_schema(&self) -> FeatureSchema {
        let mut schema = FeatureSchema::new();
        schema.push("audio", self.audio_length());
        for key in &self.input_keys {
            schema.push(key.clone(), self.input_length());
        }
        schema
    }
}

fn whole(value: f64, name: &str) -> Result<()> {
    if (value - value.round()).abs() > INTEGRAL_TOLERANCE {
        return Err(VocoderError::Metadata(format!(
            "{name} = {value} is not an integer"
        )));
    }
    Ok(())
}

// Python writes rates as either int or float.
#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(i64),
    Float(f64),
}

fn number_as_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(match Number::deserialize(deserializer)? {
        Number::Int(i) => i as f64,
        Number::Float(f) => f,
    })
}
