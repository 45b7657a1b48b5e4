// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Filesystem-facing concerns shared by the use cases:
//
//   checkpoint.rs  decoder weights + model config on disk
//                  (Burn full-precision MessagePack records,
//                  JSON pointer files)
//
//   evaluation.rs  scans exported training-run CSVs into
//                  model → split → loss series, smooths them
//                  and assigns stable per-model colours
//
//   plot.rs        SVG figures for loss curves and examples
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training-run CSV scanning and loss curves
pub mod evaluation;

/// SVG rendering of loss curves and example records
pub mod plot;
