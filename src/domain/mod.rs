// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits describing the core
// concepts of the vocoder data pipeline:
//
//   Metadata       — dataset descriptor (rates, durations, keys)
//   Split          — named dataset partition (all/train/valid/test)
//   ExampleRecord  — one aligned (audio, conditioning) example
//   FeatureSchema  — the fixed length expected for every feature
//   VocoderError   — the error taxonomy shared by every layer
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O (bytes in, values out)
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// Error taxonomy and crate-wide Result alias
pub mod error;

/// Dataset descriptor stored next to the record files
pub mod metadata;

/// Dataset partitions and their file-name patterns
pub mod split;

/// Example records and fixed-length feature schemas
pub mod example;

// Core abstractions (traits) that other layers implement
pub mod traits;
