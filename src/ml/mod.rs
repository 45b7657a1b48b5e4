// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Construction-time composition of the vocoder models.
//
//   config.rs        ModelConfig: every builder knob with defaults
//   preprocessor.rs  f0 (+ osc) scaling to [batch, time, 1] features
//   decoder.rs       RNN-FC decoder: FC stacks → GRU → FC → dense
//   processors.rs    harmonic-plus-noise synthesis settings + losses
//   model.rs         HpnAutoencoder and its named variants
//   builder.rs       ModelBuilder: config → variant → restore
//
// Reference: Burn Book §3 (Building Blocks)

/// Model builder configuration and defaults
pub mod config;

/// Conditioning-signal preprocessors
pub mod preprocessor;

/// Recurrent + fully connected decoder
pub mod decoder;

/// Synthesis processor group and spectral loss settings
pub mod processors;

/// Autoencoder variants
pub mod model;

/// Builds a configured variant and restores its weights
pub mod builder;
