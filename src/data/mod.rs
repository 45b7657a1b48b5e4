// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from record files on disk to tensor batches.
//
//   metadata.pickle + *.tfrecord
//       │
//       ▼
//   tfrecord          → framed payloads, checksums verified
//       │
//       ▼
//   example           → tf.train.Example decode against schema
//       │
//       ▼
//   pipeline          → interleave, shuffle, repeat, batch, prefetch
//       │
//       ▼
//   provider          → DataProvider / TfRecordProvider API
//       │
//       ▼
//   batcher           → Burn tensors per feature
//
// Reference: Rust Book §13 (Iterators and Closures)

/// TFRecord container reader and writer
pub mod tfrecord;

/// tf.train.Example serialization and fixed-length parsing
pub mod example;

/// Concurrent interleave / shuffle / batch / prefetch stages
pub mod pipeline;

/// DataProvider trait and the TFRecord-backed provider
pub mod provider;

/// Converts batches into Burn tensors
pub mod batcher;
