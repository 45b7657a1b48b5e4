// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every fallible library-level operation returns
// `domain::error::Result<T>`. The application and CLI layers
// wrap these in anyhow with extra context.
//
// Four families of failure:
//   configuration — bad directories, unknown model types, bad
//                   splits, non-integral window sizes
//   data          — malformed or length-mismatched records
//   resource      — missing metadata or checkpoint files (Io)
//   consistency   — mismatched paired lists
//
// None of them are retried anywhere in the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for all library-level operations.
pub type Result<T> = std::result::Result<T, VocoderError>;

/// Error type shared by the data, ml and infra layers.
#[derive(Error, Debug)]
pub enum VocoderError {
    /// Generic configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Split name outside {all, train, valid, test}.
    #[error("split must be either all, train, valid or test (got '{0}')")]
    InvalidSplit(String),

    /// `model_type` does not name a known variant.
    #[error("'{0}' is not a valid model_type")]
    UnknownModelType(String),

    /// `window_secs * input_rate` is not a whole number of frames.
    #[error(
        "window_secs ({window_secs}) and input_rate ({input_rate}) must result \
         in an integer number of samples per window"
    )]
    NonIntegralWindow { window_secs: f64, input_rate: f64 },

    /// Metadata lacks the example count for a requested split.
    #[error("metadata has no n_samples_{0}; cannot read split '{0}'")]
    MissingSplitCount(String),

    /// Invalid or unreadable metadata descriptor.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// A record failed to decode against the feature schema.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A record container is truncated or fails its checksum.
    #[error("Corrupt record file '{path}': {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The stream ended before the requested batch was reached.
    #[error("stream exhausted: requested batch {requested}, only {available} available")]
    Exhausted { requested: usize, available: usize },

    /// Paired sequences disagree in length.
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Checkpoint save/restore failure.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Plot rendering failure.
    #[error("Plot error: {0}")]
    Plot(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
