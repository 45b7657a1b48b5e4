// ============================================================
// Layer 7 — Utilities
// ============================================================
// Small helpers used around training but not by the pipeline:
//
//   filter.rs      zero-phase Butterworth high/low-pass
//   spectrogram.rs mel spectrogram in dB
//   timed_list.rs  values stamped with their append time

/// Butterworth design and forward-backward filtering
pub mod filter;

/// STFT + mel filterbank for spectrogram plots
pub mod spectrogram;

/// Append-only list with wall-clock timestamps
pub mod timed_list;
