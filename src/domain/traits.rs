// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The data layer produces examples through these traits so
// that batching, repetition and prefetch never need to know
// where the examples come from.
//
// Implementations:
//   - TfRecordDataset → reads *.tfrecord files from a directory
//   - VecSource       → serves records held in memory (tests,
//                       generated data)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::error::Result;
use crate::domain::example::ExampleRecord;

/// A single pass over a dataset. Items are pulled sequentially;
/// the first `Err` ends the pass.
pub type ExampleStream = Box<dyn Iterator<Item = Result<ExampleRecord>> + Send>;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// A lazy, restartable sequence of example records.
///
/// Every call to `stream()` starts a fresh pass from the
/// beginning. Shuffling sources reshuffle on every pass.
pub trait ExampleSource: Send + Sync {
    fn stream(&self) -> ExampleStream;
}

// ─── VecSource ────────────────────────────────────────────────────────────────
/// In-memory source; every pass yields the records in order.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    records: Vec<ExampleRecord>,
}

impl VecSource {
    pub fn new(records: Vec<ExampleRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ExampleSource for VecSource {
    fn stream(&self) -> ExampleStream {
        Box::new(self.records.clone().into_iter().map(Ok))
    }
}
