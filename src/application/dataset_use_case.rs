// ============================================================
// Layer 2 — DatasetUseCase
// ============================================================
// Read-only views of a prepared dataset directory:
//
//   inspect  metadata.pickle + which record files the split selects
//   peek     materialise the N-th unshuffled batch, summarise every
//            feature and optionally plot its first example, as
//            waveforms and as a mel spectrogram with its f0 track
//
// Reference: Rust Book §13 (Iterators and Closures)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::data::provider::{DataProvider, ProviderOptions, TfRecordProvider};
use crate::domain::example::ExampleRecord;
use crate::domain::metadata::Metadata;
use crate::domain::split::Split;
use crate::infra::plot::{self, SpectrogramPlot};
use crate::util::filter::{pass_filter, FilterType, DEFAULT_ORDER};
use crate::util::spectrogram::MelOptions;

#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub data_dir: PathBuf,
    pub split:    String,
    pub seed:     Option<u64>,
}

#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub metadata: Metadata,
    pub split:    Split,
    pub pattern:  String,
    pub files:    Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStats {
    pub name:   String,
    pub length: usize,
    pub min:    f32,
    pub max:    f32,
    pub mean:   f32,
}

/// Optional zero-phase filter applied to the audio before plotting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotFilter {
    pub cutoff:      f64,
    pub filter_type: FilterType,
}

#[derive(Debug, Clone)]
pub struct PeekRequest {
    pub batch_size:   usize,
    pub batch_number: usize,
    pub plot_path:    Option<PathBuf>,
    pub plot_filter:  Option<PlotFilter>,
    pub spectrogram:  Option<PathBuf>,
    pub mel:          MelOptions,
}

impl PeekRequest {
    pub fn new(batch_size: usize, batch_number: usize) -> Self {
        Self {
            batch_size,
            batch_number,
            plot_path:   None,
            plot_filter: None,
            spectrogram: None,
            mel:         MelOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PeekReport {
    pub batch_size: usize,
    pub stats:      Vec<FeatureStats>,
}

pub struct DatasetUseCase {
    provider: TfRecordProvider,
}

impl DatasetUseCase {
    pub fn new(cfg: DatasetConfig) -> Result<Self> {
        let options = ProviderOptions { seed: cfg.seed, ..ProviderOptions::default() };
        let provider = TfRecordProvider::from_split_name(&cfg.data_dir, &cfg.split)
            .with_context(|| format!("Cannot open dataset '{}'", cfg.data_dir.display()))?
            .with_options(options);
        Ok(Self { provider })
    }

    pub fn inspect(&self) -> Result<DatasetSummary> {
        let files = self.provider.list_files().context("Cannot list record files")?;
        tracing::info!(
            "Split '{}' selects {} files ({})",
            self.provider.split(),
            files.len(),
            self.provider.file_pattern()
        );
        Ok(DatasetSummary {
            metadata: self.provider.metadata().clone(),
            split:    self.provider.split(),
            pattern:  self.provider.file_pattern(),
            files,
        })
    }

    pub fn peek(&self, req: &PeekRequest) -> Result<PeekReport> {
        let batch = self
            .provider
            .get_single_batch(req.batch_size, req.batch_number)
            .with_context(|| format!("Cannot read batch {}", req.batch_number))?;

        let schema = self.provider.metadata().feature_schema();
        let stats = schema
            .fields()
            .iter()
            .filter_map(|(name, length)| {
                batch.feature(name).map(|values| summarise(name, *length, &values))
            })
            .collect();

        let wants_plot = req.plot_path.is_some() || req.spectrogram.is_some();
        if let (true, Some(first)) = (wants_plot, batch.records().first()) {
            let record = self.prepare_plot(first, req.plot_filter)?;
            let meta = self.provider.metadata();
            if let Some(path) = &req.plot_path {
                plot::plot_example(path, &record, meta.audio_rate, meta.input_rate)
                    .with_context(|| format!("Cannot plot example to '{}'", path.display()))?;
                tracing::info!("Plotted first example of batch to '{}'", path.display());
            }
            if let Some(path) = &req.spectrogram {
                let nyquist = meta.audio_rate / 2.0;
                let opts = SpectrogramPlot {
                    mel:   MelOptions { fmax: nyquist, ..req.mel },
                    ymax:  nyquist,
                    title: Some(format!("batch {} example 1", req.batch_number)),
                    ..SpectrogramPlot::default()
                };
                let audio = record.audio().unwrap_or_default();
                let f0 = record.features.get("f0").map(Vec::as_slice).unwrap_or_default();
                plot::plot_audio_f0(path, audio, meta.audio_rate.round() as u32, f0, meta.input_rate, &opts)
                    .with_context(|| format!("Cannot plot spectrogram to '{}'", path.display()))?;
                tracing::info!("Plotted spectrogram of first example to '{}'", path.display());
            }
        }

        Ok(PeekReport { batch_size: batch.len(), stats })
    }

    fn prepare_plot(&self, source: &ExampleRecord, filter: Option<PlotFilter>) -> Result<ExampleRecord> {
        let mut record = source.clone();
        if let (Some(f), Some(audio)) = (filter, source.audio()) {
            let filtered = pass_filter(
                audio,
                self.provider.metadata().audio_rate,
                f.cutoff,
                f.filter_type,
                DEFAULT_ORDER,
            )
            .context("Cannot filter audio")?;
            record.features.insert("audio".into(), filtered);
        }
        Ok(record)
    }

    pub fn data_dir(&self) -> &Path {
        self.provider.data_dir()
    }
}

fn summarise(name: &str, length: usize, values: &[f32]) -> FeatureStats {
    let (min, max, sum) = values.iter().fold(
        (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
        |(lo, hi, sum), v| (lo.min(*v), hi.max(*v), sum + *v as f64),
    );
    let mean = if values.is_empty() { 0.0 } else { (sum / values.len() as f64) as f32 };
    FeatureStats { name: name.to_string(), length, min, max, mean }
}
