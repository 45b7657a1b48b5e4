// ============================================================
// Layer 4 — Data Providers
// ============================================================
// A DataProvider owns a validated Metadata descriptor and hands
// out example streams built by the pipeline module:
//
//   get_dataset(shuffle)          → restartable example source
//   get_batch(size, shuffle, rep) → prefetched batch stream
//   get_single_batch(size, n)     → the n-th unshuffled batch
//
// TfRecordProvider reads `<data_dir>/metadata.pickle` and the
// record files selected by its split:
//
//   all   → *.tfrecord
//   other → *<split>.tfrecord
//
// Shuffling (per pass):
//   1. file order randomised
//   2. up to `cycle_length` files read concurrently, round-robin
//   3. examples pass through a `shuffle_buffer` reservoir
//
// Passes are reproducible only when `ProviderOptions::seed` is set.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::pipeline::{Batch, BatchStream, Interleave, Repeats, ShuffleBuffer};
use crate::domain::error::{Result, VocoderError};
use crate::domain::example::FeatureSchema;
use crate::domain::metadata::{Metadata, METADATA_FILE};
use crate::domain::split::Split;
use crate::domain::traits::{ExampleSource, ExampleStream};

// ─── Options ──────────────────────────────────────────────────────────────────
/// Tuning knobs for the read pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOptions {
    /// Seed for file-order and reservoir shuffling. None draws
    /// fresh entropy for every pass.
    pub seed: Option<u64>,
    /// Maximum number of files read concurrently.
    pub cycle_length: usize,
    /// Reservoir size of the element shuffle.
    pub shuffle_buffer: usize,
    /// Per-reader queue depth.
    pub reader_queue: usize,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            seed: None,
            cycle_length: 40,
            shuffle_buffer: 1000,
            reader_queue: 64,
        }
    }
}

// ─── DataProvider ─────────────────────────────────────────────────────────────
/// Anything that can serve example records described by Metadata.
pub trait DataProvider {
    fn metadata(&self) -> &Metadata;

    /// A lazy, restartable sequence of examples.
    fn get_dataset(&self, shuffle: bool) -> Result<Arc<dyn ExampleSource>>;

    /// Repeated, batched, prefetched examples. Trailing partial
    /// batches are dropped.
    fn get_batch(&self, batch_size: usize, shuffle: bool, repeats: Repeats) -> Result<BatchStream> {
        let source = self.get_dataset(shuffle)?;
        BatchStream::spawn(source, batch_size, repeats)
    }

    /// The `batch_number`-th (1-indexed) batch of one unshuffled
    /// pass. Repeatable across calls.
    fn get_single_batch(&self, batch_size: usize, batch_number: usize) -> Result<Batch> {
        if batch_number == 0 {
            return Err(VocoderError::Config("batch_number is 1-indexed".into()));
        }
        let stream = self.get_batch(batch_size, false, Repeats::Times(1))?;
        let mut seen = 0usize;
        for batch in stream {
            let batch = batch?;
            seen += 1;
            if seen == batch_number {
                return Ok(batch);
            }
        }
        Err(VocoderError::Exhausted { requested: batch_number, available: seen })
    }
}

/// Read and validate `<data_dir>/metadata.pickle`.
pub fn load_metadata(data_dir: &Path) -> Result<Metadata> {
    let bytes = fs::read(data_dir.join(METADATA_FILE))?;
    Metadata::from_pickle(&bytes)
}

/// Write `<data_dir>/metadata.pickle`.
pub fn save_metadata(data_dir: &Path, metadata: &Metadata) -> Result<()> {
    fs::write(data_dir.join(METADATA_FILE), metadata.to_pickle()?)?;
    Ok(())
}

// ─── TfRecordProvider ─────────────────────────────────────────────────────────
pub struct TfRecordProvider {
    data_dir: PathBuf,
    split: Split,
    metadata: Metadata,
    options: ProviderOptions,
}

impl TfRecordProvider {
    /// Open a data directory for one split.
    ///
    /// Fails with a configuration error for an empty or missing
    /// directory or a split without a recorded example count; a
    /// missing metadata file surfaces as an IO error.
    pub fn new(data_dir: impl Into<PathBuf>, split: Split) -> Result<Self> {
        let data_dir = data_dir.into();
        if data_dir.as_os_str().is_empty() {
            return Err(VocoderError::Config("path to the data directory cannot be empty".into()));
        }
        if !data_dir.is_dir() {
            return Err(VocoderError::Config(format!(
                "data directory '{}' does not exist",
                data_dir.display()
            )));
        }

        let metadata = load_metadata(&data_dir)?;
        if metadata.split_count(split).is_none() {
            return Err(VocoderError::MissingSplitCount(split.to_string()));
        }

        tracing::info!(
            "Opened '{}' split={} audio_length={} input_length={} inputs={:?}",
            data_dir.display(),
            split,
            metadata.audio_length(),
            metadata.input_length(),
            metadata.input_keys,
        );

        Ok(Self { data_dir, split, metadata, options: ProviderOptions::default() })
    }

    /// Same as `new` with the split given by name.
    pub fn from_split_name(data_dir: impl Into<PathBuf>, split: &str) -> Result<Self> {
        Self::new(data_dir, split.parse()?)
    }

    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn split(&self) -> Split {
        self.split
    }

    /// e.g. "/data/*train.tfrecord"
    pub fn file_pattern(&self) -> String {
        self.data_dir.join(self.split.file_pattern()).display().to_string()
    }

    /// Record files matching the split, sorted by name.
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| self.split.matches(name));
            if matches && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        tracing::debug!("{} files match '{}'", files.len(), self.file_pattern());
        Ok(files)
    }
}

impl DataProvider for TfRecordProvider {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn get_dataset(&self, shuffle: bool) -> Result<Arc<dyn ExampleSource>> {
        Ok(Arc::new(TfRecordDataset {
            files: self.list_files()?,
            schema: Arc::new(self.metadata.feature_schema()),
            shuffle,
            options: self.options.clone(),
            passes: AtomicU64::new(0),
        }))
    }
}

// ─── TfRecordDataset ──────────────────────────────────────────────────────────
/// A fixed list of record files; each `stream()` is one pass.
pub struct TfRecordDataset {
    files: Vec<PathBuf>,
    schema: Arc<FeatureSchema>,
    shuffle: bool,
    options: ProviderOptions,
    passes: AtomicU64,
}

impl TfRecordDataset {
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl ExampleSource for TfRecordDataset {
    fn stream(&self) -> ExampleStream {
        let pass = self.passes.fetch_add(1, Ordering::Relaxed);
        let mut files = self.files.clone();
        let opts = &self.options;

        if !self.shuffle {
            let records = Interleave::new(files, Arc::clone(&self.schema), opts.cycle_length, opts.reader_queue);
            return Box::new(records);
        }

        let mut rng = match opts.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(pass)),
            None => StdRng::from_entropy(),
        };
        files.shuffle(&mut rng);
        let records = Interleave::new(files, Arc::clone(&self.schema), opts.cycle_length, opts.reader_queue);
        Box::new(ShuffleBuffer::new(records, opts.shuffle_buffer, rng))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::example::serialize_record;
    use crate::data::tfrecord::TfRecordWriter;
    use crate::domain::example::ExampleRecord;

    fn metadata() -> Metadata {
        Metadata {
            audio_rate: 8.0,
            input_rate: 2.0,
            input_keys: vec!["f0".into()],
            n_samples: 12,
            n_samples_train: Some(6),
            n_samples_valid: Some(3),
            n_samples_test: None,
            example_secs: 1.0,
            hop_secs: 1.0,
        }
    }

    fn record(i: usize) -> ExampleRecord {
        ExampleRecord::new()
            .with("audio", vec![i as f32; 8])
            .with("f0", vec![100.0 + i as f32; 2])
    }

    fn id(r: &ExampleRecord) -> usize {
        r.audio().unwrap()[0] as usize
    }

    fn write(dir: &Path, name: &str, ids: std::ops::Range<usize>) {
        let mut writer = TfRecordWriter::create(dir.join(name)).unwrap();
        for i in ids {
            writer.write_record(&serialize_record(&record(i))).unwrap();
        }
        writer.flush().unwrap();
    }

    fn data_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        save_metadata(dir.path(), &metadata()).unwrap();
        write(dir.path(), "set_train.tfrecord", 0..6);
        write(dir.path(), "set_valid.tfrecord", 100..103);
        write(dir.path(), "set_test.tfrecord", 200..203);
        dir
    }

    #[test]
    fn test_empty_data_dir_is_config_error() {
        assert!(matches!(TfRecordProvider::new("", Split::All), Err(VocoderError::Config(_))));
    }

    #[test]
    fn test_missing_metadata_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(TfRecordProvider::new(dir.path(), Split::All), Err(VocoderError::Io(_))));
    }

    #[test]
    fn test_invalid_split_name() {
        let dir = data_dir();
        assert!(matches!(
            TfRecordProvider::from_split_name(dir.path(), "eval"),
            Err(VocoderError::InvalidSplit(_))
        ));
    }

    #[test]
    fn test_split_without_count_is_rejected() {
        let dir = data_dir();
        assert!(matches!(
            TfRecordProvider::new(dir.path(), Split::Test),
            Err(VocoderError::MissingSplitCount(_))
        ));
    }

    #[test]
    fn test_train_split_reads_only_train_files() {
        let dir = data_dir();
        let provider = TfRecordProvider::new(dir.path(), Split::Train).unwrap();
        let files = provider.list_files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("set_train.tfrecord"));

        let ids: Vec<usize> = provider
            .get_dataset(false)
            .unwrap()
            .stream()
            .map(|r| id(&r.unwrap()))
            .collect();
        assert_eq!(ids, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn test_all_split_reads_every_file() {
        let dir = data_dir();
        let provider = TfRecordProvider::new(dir.path(), Split::All).unwrap();
        assert_eq!(provider.list_files().unwrap().len(), 3);
        assert_eq!(provider.get_dataset(true).unwrap().stream().count(), 12);
    }

    #[test]
    fn test_shuffled_pass_is_permutation() {
        let dir = data_dir();
        let provider = TfRecordProvider::new(dir.path(), Split::Train)
            .unwrap()
            .with_options(ProviderOptions { seed: Some(1), ..Default::default() });
        let mut ids: Vec<usize> = provider
            .get_dataset(true)
            .unwrap()
            .stream()
            .map(|r| id(&r.unwrap()))
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn test_each_shuffled_pass_is_reshuffled() {
        let dir = tempfile::tempdir().unwrap();
        save_metadata(dir.path(), &metadata()).unwrap();
        write(dir.path(), "big_train.tfrecord", 0..50);
        let dataset = TfRecordProvider::new(dir.path(), Split::Train)
            .unwrap()
            .with_options(ProviderOptions { seed: Some(3), shuffle_buffer: 64, ..Default::default() })
            .get_dataset(true)
            .unwrap();

        let first: Vec<usize> = dataset.stream().map(|r| id(&r.unwrap())).collect();
        let second: Vec<usize> = dataset.stream().map(|r| id(&r.unwrap())).collect();
        assert_ne!(first, second);

        let (mut a, mut b) = (first, second);
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, (0..50).collect::<Vec<_>>());
        assert_eq!(a, b);
    }

    #[test]
    fn test_one_repeat_gives_floor_batches() {
        let dir = data_dir();
        let provider = TfRecordProvider::new(dir.path(), Split::Train).unwrap();
        let batches = provider.get_batch(4, true, Repeats::Times(1)).unwrap();
        assert_eq!(batches.count(), 1);
    }

    #[test]
    fn test_infinite_repeat_never_stops() {
        let dir = data_dir();
        let provider = TfRecordProvider::new(dir.path(), Split::Train).unwrap();
        let batches = provider.get_batch(4, true, Repeats::from_count(-1)).unwrap();
        assert_eq!(batches.take(20).filter(|b| b.is_ok()).count(), 20);
    }

    #[test]
    fn test_single_batch_is_deterministic() {
        let dir = data_dir();
        let provider = TfRecordProvider::new(dir.path(), Split::Train).unwrap();
        for _ in 0..3 {
            let batch = provider.get_single_batch(1, 3).unwrap();
            assert_eq!(batch.len(), 1);
            assert_eq!(id(&batch.records()[0]), 2);
        }
    }

    #[test]
    fn test_single_batch_past_end_is_exhausted() {
        let dir = data_dir();
        let provider = TfRecordProvider::new(dir.path(), Split::Valid).unwrap();
        assert!(matches!(
            provider.get_single_batch(2, 2),
            Err(VocoderError::Exhausted { requested: 2, available: 1 })
        ));
    }

    #[test]
    fn test_no_matching_files_gives_no_batches() {
        let dir = tempfile::tempdir().unwrap();
        save_metadata(dir.path(), &metadata()).unwrap();
        let provider = TfRecordProvider::new(dir.path(), Split::Train).unwrap();
        assert_eq!(provider.get_batch(1, false, Repeats::Forever).unwrap().count(), 0);
    }

    #[test]
    fn test_wrong_length_record_fails_stream() {
        let dir = data_dir();
        let mut writer = TfRecordWriter::create(dir.path().join("zz_train.tfrecord")).unwrap();
        let bad = ExampleRecord::new().with("audio", vec![0.0; 7]).with("f0", vec![0.0; 2]);
        writer.write_record(&serialize_record(&bad)).unwrap();
        writer.flush().unwrap();

        let provider = TfRecordProvider::new(dir.path(), Split::Train).unwrap();
        let results: Vec<_> = provider.get_dataset(false).unwrap().stream().collect();
        assert!(results.iter().any(|r| matches!(r, Err(VocoderError::Decode(_)))));
    }
}
