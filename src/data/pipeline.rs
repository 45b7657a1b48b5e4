// ============================================================
// Layer 4 — Streaming Pipeline
// ============================================================
// Turns a list of record files into a stream of batches:
//
//   record files
//       │
//       ▼
//   Interleave      → up to `cycle_length` reader threads, each
//       │             reading + parsing one file into its own
//       │             bounded queue; pulled round-robin
//       ▼
//   ShuffleBuffer   → reservoir of `shuffle_buffer` examples,
//       │             one random element emitted per pull
//       ▼
//   BatchStream     → producer thread: repeat passes, cut fixed
//                     size batches (trailing partial dropped),
//                     push into a bounded prefetch queue
//
// Callers only ever pull. Dropping a stream disconnects its
// queues; every producer exits on its next send.
//
// Reference: crossbeam-channel bounded queues
//            rand crate documentation

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use rand::rngs::StdRng;
use rand::Rng;

use crate::data::example::parse_example;
use crate::data::tfrecord::TfRecordReader;
use crate::domain::error::{Result, VocoderError};
use crate::domain::example::{ExampleRecord, FeatureSchema};
use crate::domain::traits::ExampleSource;

type RecordQueue = Receiver<Result<ExampleRecord>>;

// ─── Interleave ───────────────────────────────────────────────────────────────
/// Reads several record files concurrently and yields their
/// examples in round-robin order, one example per file per turn.
///
/// The order is fully determined by the file list, so an
/// unshuffled file list gives a repeatable stream.
pub struct Interleave {
    pending: VecDeque<PathBuf>,
    active: VecDeque<RecordQueue>,
    schema: Arc<FeatureSchema>,
    cycle_length: usize,
    queue_capacity: usize,
    failed: bool,
}

impl Interleave {
    pub fn new(
        files: Vec<PathBuf>,
        schema: Arc<FeatureSchema>,
        cycle_length: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            pending: files.into(),
            active: VecDeque::new(),
            schema,
            cycle_length: cycle_length.max(1),
            queue_capacity: queue_capacity.max(1),
            failed: false,
        }
    }

    fn open_readers(&mut self) -> Result<()> {
        while self.active.len() < self.cycle_length {
            let Some(path) = self.pending.pop_front() else {
                break;
            };
            let queue = spawn_reader(path, Arc::clone(&self.schema), self.queue_capacity)?;
            self.active.push_back(queue);
        }
        Ok(())
    }
}

impl Iterator for Interleave {
    type Item = Result<ExampleRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Err(e) = self.open_readers() {
                self.failed = true;
                return Some(Err(e));
            }
            let queue = self.active.pop_front()?;
            match queue.recv() {
                Ok(Ok(record)) => {
                    self.active.push_back(queue);
                    return Some(Ok(record));
                }
                Ok(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                // Reader finished its file; its slot goes to the next file.
                Err(_) => continue,
            }
        }
    }
}

/// Start one reader thread for `path`. The thread parses every
/// record and stops at the first error or when the queue's
/// receiving side is dropped.
fn spawn_reader(
    path: PathBuf,
    schema: Arc<FeatureSchema>,
    capacity: usize,
) -> Result<RecordQueue> {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let name = format!(
        "reader-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("records")
    );
    thread::Builder::new()
        .name(name)
        .spawn(move || read_file(path, &schema, tx))?;
    Ok(rx)
}

fn read_file(path: PathBuf, schema: &FeatureSchema, tx: Sender<Result<ExampleRecord>>) {
    tracing::debug!("Reading '{}'", path.display());
    let reader = match TfRecordReader::open(&path) {
        Ok(reader) => reader,
        Err(e) => {
            let _ = tx.send(Err(e));
            return;
        }
    };
    let mut count = 0usize;
    for raw in reader {
        let item = raw.and_then(|bytes| parse_example(&bytes, schema));
        let failed = item.is_err();
        if tx.send(item).is_err() {
            return;
        }
        if failed {
            tracing::warn!("Stopped reading '{}' after a bad record", path.display());
            return;
        }
        count += 1;
    }
    tracing::debug!("Finished '{}' ({} records)", path.display(), count);
}

// ─── ShuffleBuffer ────────────────────────────────────────────────────────────
/// Fixed-size reservoir shuffle.
///
/// The buffer is filled to `capacity`; each pull emits a random
/// buffered element and refills its slot from upstream. Once
/// upstream ends the remaining elements drain in random order.
pub struct ShuffleBuffer<I, T> {
    inner: I,
    buffer: Vec<T>,
    capacity: usize,
    rng: StdRng,
    upstream_done: bool,
}

impl<I, T> ShuffleBuffer<I, T>
where
    I: Iterator<Item = Result<T>>,
{
    pub fn new(inner: I, capacity: usize, rng: StdRng) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            buffer: Vec::with_capacity(capacity),
            capacity,
            rng,
            upstream_done: false,
        }
    }
}

impl<I, T> Iterator for ShuffleBuffer<I, T>
where
    I: Iterator<Item = Result<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.upstream_done && self.buffer.len() < self.capacity {
            match self.inner.next() {
                Some(Ok(item)) => self.buffer.push(item),
                Some(Err(e)) => {
                    self.upstream_done = true;
                    self.buffer.clear();
                    return Some(Err(e));
                }
                None => self.upstream_done = true,
            }
        }
        if self.buffer.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.buffer.len());
        Some(Ok(self.buffer.swap_remove(index)))
    }
}

// ─── Repeats ──────────────────────────────────────────────────────────────────
/// How many passes over the source a batch stream makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeats {
    Forever,
    Times(usize),
}

impl Repeats {
    /// Negative counts mean "repeat forever".
    pub fn from_count(count: i64) -> Self {
        if count < 0 {
            Repeats::Forever
        } else {
            Repeats::Times(count as usize)
        }
    }

    fn allows(&self, pass: usize) -> bool {
        match self {
            Repeats::Forever => true,
            Repeats::Times(n) => pass < *n,
        }
    }
}

impl Default for Repeats {
    fn default() -> Self {
        Repeats::Forever
    }
}

// ─── Batch ────────────────────────────────────────────────────────────────────
/// A fixed-size group of example records.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    records: Vec<ExampleRecord>,
}

impl Batch {
    pub fn new(records: Vec<ExampleRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ExampleRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ExampleRecord> {
        self.records
    }

    /// One feature across the batch, flattened row-major to
    /// `[batch_size * length]`. None if any record lacks it.
    pub fn feature(&self, name: &str) -> Option<Vec<f32>> {
        let mut flat = Vec::new();
        for record in &self.records {
            flat.extend_from_slice(record.get(name)?);
        }
        Some(flat)
    }
}

// ─── BatchStream ──────────────────────────────────────────────────────────────
/// Batches produced on a background thread and handed over
/// through a bounded prefetch queue.
pub struct BatchStream {
    rx: Receiver<Result<Batch>>,
}

impl BatchStream {
    /// Start producing batches from `source`.
    ///
    /// Batches may span pass boundaries; only the partial batch
    /// left after the final pass is dropped. A pass that yields
    /// nothing ends the stream even under `Repeats::Forever`.
    pub fn spawn(
        source: Arc<dyn ExampleSource>,
        batch_size: usize,
        repeats: Repeats,
    ) -> Result<Self> {
        Self::spawn_with_prefetch(source, batch_size, repeats, auto_prefetch())
    }

    pub fn spawn_with_prefetch(
        source: Arc<dyn ExampleSource>,
        batch_size: usize,
        repeats: Repeats,
        prefetch: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(VocoderError::Config("batch_size must be at least 1".into()));
        }
        let (tx, rx) = crossbeam_channel::bounded(prefetch.max(1));
        thread::Builder::new()
            .name("batch-producer".into())
            .spawn(move || produce_batches(source.as_ref(), batch_size, repeats, tx))?;
        Ok(Self { rx })
    }
}

impl Iterator for BatchStream {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

fn produce_batches(
    source: &dyn ExampleSource,
    batch_size: usize,
    repeats: Repeats,
    tx: Sender<Result<Batch>>,
) {
    let mut pending = Vec::with_capacity(batch_size);
    let mut pass = 0usize;

    while repeats.allows(pass) {
        let mut produced = 0usize;
        for item in source.stream() {
            match item {
                Ok(record) => {
                    produced += 1;
                    pending.push(record);
                    if pending.len() == batch_size {
                        let batch = Batch::new(std::mem::take(&mut pending));
                        if tx.send(Ok(batch)).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            }
        }
        pass += 1;
        tracing::debug!("Pass {} complete ({} examples)", pass, produced);
        if produced == 0 {
            break;
        }
    }

    if !pending.is_empty() {
        tracing::debug!("Dropping partial batch of {} examples", pending.len());
    }
}

/// Prefetch depth derived from the machine's parallelism.
fn auto_prefetch() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .clamp(2, 8)
}
