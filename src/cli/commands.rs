// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Four subcommands: `inspect`, `peek`, `build`, `evaluate`.
//
// clap's derive macros generate help text, missing-argument
// errors and string → number conversion for every flag.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::application::build_use_case::{BuildConfig, ComputeBackend};
use crate::application::dataset_use_case::{DatasetConfig, PeekRequest, PlotFilter};
use crate::application::evaluate_use_case::EvaluateConfig;
use crate::util::filter::FilterType;
use crate::util::spectrogram::{MelOptions, DEFAULT_N_FFT, DEFAULT_N_MELS};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show dataset metadata and the record files a split selects
    Inspect(DatasetArgs),

    /// Read the N-th unshuffled batch and summarise its features
    Peek(PeekArgs),

    /// Assemble a model from a config, optionally restoring weights
    Build(BuildArgs),

    /// Summarise and plot exported training-run losses
    Evaluate(EvaluateArgs),
}

/// Dataset location shared by `inspect` and `peek`.
#[derive(Args, Debug)]
pub struct DatasetArgs {
    /// Directory holding metadata.pickle and *.tfrecord files
    #[arg(long)]
    pub data_dir: PathBuf,

    /// all | train | valid | test
    #[arg(long, default_value = "all")]
    pub split: String,

    /// Fixed shuffle seed
    #[arg(long)]
    pub seed: Option<u64>,
}

impl From<DatasetArgs> for DatasetConfig {
    fn from(a: DatasetArgs) -> Self {
        DatasetConfig { data_dir: a.data_dir, split: a.split, seed: a.seed }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FilterKind {
    Low,
    High,
}

impl From<FilterKind> for FilterType {
    fn from(k: FilterKind) -> Self {
        match k {
            FilterKind::Low => FilterType::Lowpass,
            FilterKind::High => FilterType::Highpass,
        }
    }
}

#[derive(Args, Debug)]
pub struct PeekArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,

    /// 1-based batch index
    #[arg(long, default_value_t = 1)]
    pub batch_number: usize,

    /// Write an SVG of the batch's first example here
    #[arg(long)]
    pub plot: Option<PathBuf>,

    /// Filter cutoff in Hz applied to the plotted audio
    #[arg(long, requires = "plot")]
    pub filter_cutoff: Option<f64>,

    #[arg(long, value_enum, default_value = "high")]
    pub filter_type: FilterKind,

    /// Write a mel spectrogram SVG of the first example, f0 overlaid
    #[arg(long)]
    pub spectrogram: Option<PathBuf>,

    /// STFT size for --spectrogram
    #[arg(long, default_value_t = DEFAULT_N_FFT)]
    pub n_fft: usize,

    #[arg(long, default_value_t = DEFAULT_N_MELS)]
    pub n_mels: usize,
}

impl PeekArgs {
    pub fn request(&self) -> PeekRequest {
        PeekRequest {
            batch_size:   self.batch_size,
            batch_number: self.batch_number,
            plot_path:    self.plot.clone(),
            plot_filter:  self.filter_cutoff.map(|cutoff| PlotFilter {
                cutoff,
                filter_type: self.filter_type.into(),
            }),
            spectrogram:  self.spectrogram.clone(),
            mel:          MelOptions { n_fft: self.n_fft, n_mels: self.n_mels, ..MelOptions::default() },
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BackendKind {
    Ndarray,
    Wgpu,
}

impl From<BackendKind> for ComputeBackend {
    fn from(k: BackendKind) -> Self {
        match k {
            BackendKind::Ndarray => ComputeBackend::NdArray,
            BackendKind::Wgpu => ComputeBackend::Wgpu,
        }
    }
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// JSON model config (missing fields take their defaults)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Overrides the config's model_type
    #[arg(long)]
    pub model_type: Option<String>,

    /// Overrides the config's checkpoint_dir
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Build fresh weights even if a checkpoint dir is configured
    #[arg(long)]
    pub no_restore: bool,

    /// Write model_config.json and initial weights to this directory
    #[arg(long)]
    pub init_dir: Option<PathBuf>,

    /// Decode unshuffled batches from this dataset as a smoke test
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    pub decode_batches: usize,

    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,

    #[arg(long, value_enum, default_value = "ndarray")]
    pub backend: BackendKind,
}

impl From<BuildArgs> for BuildConfig {
    fn from(a: BuildArgs) -> Self {
        BuildConfig {
            config_path:    a.config,
            model_type:     a.model_type,
            checkpoint_dir: a.checkpoint_dir,
            no_restore:     a.no_restore,
            init_dir:       a.init_dir,
            data_dir:       a.data_dir,
            decode_batches: a.decode_batches,
            batch_size:     a.batch_size,
            backend:        a.backend.into(),
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Name of the dataset directory under evaluation/fig/training/
    #[arg(long)]
    pub data_name: String,

    /// Directory containing evaluation/
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Restrict to these model ids (repeatable)
    #[arg(long = "model-id")]
    pub model_ids: Vec<String>,

    /// Exponential smoothing factor, 0 disables
    #[arg(long, default_value_t = 0.0)]
    pub smooth: f64,

    #[arg(long, default_value_t = 1.0)]
    pub iter_per_epoch: f64,

    /// all | train | valid
    #[arg(long, default_value = "all")]
    pub split: String,

    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    pub ylim: Option<Vec<f64>>,

    /// Write the loss plot as SVG here
    #[arg(long)]
    pub plot: Option<PathBuf>,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            root:           a.root,
            data_name:      a.data_name,
            model_ids:      (!a.model_ids.is_empty()).then_some(a.model_ids),
            smooth:         a.smooth,
            iter_per_epoch: a.iter_per_epoch,
            plot_split:     a.split,
            ylim:           a.ylim.and_then(|v| Some((*v.first()?, *v.get(1)?))),
            save_path:      a.plot,
        }
    }
}
