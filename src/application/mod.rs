// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for each CLI command.
//
// Rules for this layer:
//   - No model math here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination, errors as anyhow::Result
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Dataset inspection and batch peeking
pub mod dataset_use_case;

// Model assembly, checkpoint init/restore, smoke decoding
pub mod build_use_case;

// Training-run loss summaries and plots
pub mod evaluate_use_case;
