// ============================================================
// Layer 6 — Training-run Evaluator
// ============================================================
// Reads scalar summaries exported from training runs and turns
// them into loss curves.
//
// Directory layout (relative to a root, "." by default):
//
//   evaluation/fig/training/<data_name>/
//     data/
//       run-<model_id>_summaries_<split>-tag-<tag>.csv
//       ...
//
// Each CSV has a header row containing at least `Step` and `Value`
// columns (extra columns such as `Wall time` are ignored).
//
// Result: model_id → split → LossSeries { steps, values }.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::error::{Result, VocoderError};
use crate::infra::plot;

/// 10-colour palette cycled over sorted model ids.
pub const PALETTE: [(u8, u8, u8); 10] = [
    (0x4C, 0x72, 0xB0),
    (0xDD, 0x84, 0x52),
    (0x55, 0xA8, 0x68),
    (0xC4, 0x4E, 0x52),
    (0x81, 0x72, 0xB3),
    (0x93, 0x78, 0x60),
    (0xDA, 0x8B, 0xC3),
    (0x8C, 0x8C, 0x8C),
    (0xCC, 0xB9, 0x74),
    (0x64, 0xB5, 0xCD),
];

pub const DEFAULT_SMOOTHING: f64 = 0.95;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossSeries {
    pub steps:  Vec<f64>,
    pub values: Vec<f64>,
}

/// One line (and optional smoothed overlay) ready for plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct LossCurve {
    pub model_id: String,
    pub split:    String,
    pub color:    (u8, u8, u8),
    pub epochs:   Vec<f64>,
    pub raw:      Vec<f64>,
    pub smoothed: Option<Vec<f64>>,
}

impl LossCurve {
    /// Train curves are solid, everything else dashed.
    pub fn dashed(&self) -> bool {
        self.split != "train"
    }

    /// The values a reader would quote: smoothed when present.
    pub fn shown(&self) -> &[f64] {
        self.smoothed.as_deref().unwrap_or(&self.raw)
    }
}

#[derive(Debug, Clone)]
pub struct PlotOptions {
    /// None plots every model.
    pub model_ids:      Option<Vec<String>>,
    /// Smoothing factor in [0, 1); 0 disables smoothing.
    pub smooth:         f64,
    pub iter_per_epoch: f64,
    /// "all" or a single split name.
    pub plot_split:     String,
    pub ylim:           Option<(f64, f64)>,
    pub save_path:      Option<PathBuf>,
    pub size:           (u32, u32),
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            model_ids:      None,
            smooth:         0.0,
            iter_per_epoch: 1.0,
            plot_split:     "all".into(),
            ylim:           None,
            save_path:      None,
            size:           (640, 480),
        }
    }
}

#[derive(Debug)]
pub struct TrainingEvaluator {
    data_name: String,
    fig_dir:   PathBuf,
    data_dir:  PathBuf,
    data:      BTreeMap<String, BTreeMap<String, LossSeries>>,
}

impl TrainingEvaluator {
    pub fn new(data_name: &str) -> Result<Self> {
        Self::with_root(Path::new("."), data_name)
    }

    /// Scan `<root>/evaluation/fig/training/<data_name>/data/*.csv`.
    /// A missing data directory gives an evaluator with no runs.
    pub fn with_root(root: &Path, data_name: &str) -> Result<Self> {
        if data_name.is_empty() {
            return Err(VocoderError::Config("data_name must be set.".into()));
        }
        let fig_dir = root.join("evaluation").join("fig").join("training").join(data_name);
        let data_dir = fig_dir.join("data");

        let mut data: BTreeMap<String, BTreeMap<String, LossSeries>> = BTreeMap::new();
        if !data_dir.is_dir() {
            tracing::warn!("No training data found in '{}'", data_dir.display());
            return Ok(Self { data_name: data_name.into(), fig_dir, data_dir, data });
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&data_dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        paths.sort();

        for path in paths {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let Some((model_id, split)) = parse_run_file_name(name) else {
                tracing::warn!("Skipping '{}': not a run summary file", path.display());
                continue;
            };
            let series = read_series(&path)?;
            tracing::debug!("Loaded {} points for {}/{}", series.steps.len(), model_id, split);
            data.entry(model_id).or_default().insert(split, series);
        }

        tracing::info!("Loaded {} training runs for '{}'", data.len(), data_name);
        Ok(Self { data_name: data_name.into(), fig_dir, data_dir, data })
    }

    pub fn data_name(&self) -> &str {
        &self.data_name
    }

    pub fn fig_dir(&self) -> &Path {
        &self.fig_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn data(&self) -> &BTreeMap<String, BTreeMap<String, LossSeries>> {
        &self.data
    }

    pub fn model_ids(&self) -> Vec<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    /// Exponential smoothing: s[0] = y[0], s[i] = a·s[i-1] + (1-a)·y[i-1].
    pub fn get_smoothed(y: &[f64], a: f64) -> Vec<f64> {
        let mut smoothed = y.to_vec();
        for i in 1..y.len() {
            smoothed[i] = a * smoothed[i - 1] + (1.0 - a) * y[i - 1];
        }
        smoothed
    }

    /// Colour per model id, stable across calls and independent of
    /// which subset is plotted.
    pub fn colors(&self) -> BTreeMap<&str, (u8, u8, u8)> {
        self.data
            .keys()
            .enumerate()
            .map(|(i, id)| (id.as_str(), PALETTE[i % PALETTE.len()]))
            .collect()
    }

    /// Build the curves selected by `opts`; writes an SVG when
    /// `opts.save_path` is set.
    pub fn plot_losses(&self, opts: &PlotOptions) -> Result<Vec<LossCurve>> {
        if opts.iter_per_epoch <= 0.0 {
            return Err(VocoderError::Config("iter_per_epoch must be positive".into()));
        }
        if !(0.0..=1.0).contains(&opts.smooth) {
            return Err(VocoderError::Config(format!("smooth must lie in [0, 1], got {}", opts.smooth)));
        }
        let colors = self.colors();
        let mut curves = Vec::new();

        for (model_id, splits) in &self.data {
            if let Some(ids) = &opts.model_ids {
                if !ids.iter().any(|id| id == model_id) {
                    continue;
                }
            }
            let color = colors.get(model_id.as_str()).copied().unwrap_or(PALETTE[0]);
            for (split, series) in splits {
                if opts.plot_split != "all" && *split != opts.plot_split {
                    continue;
                }
                let smoothed = (opts.smooth > 0.0).then(|| Self::get_smoothed(&series.values, opts.smooth));
                curves.push(LossCurve {
                    model_id: model_id.clone(),
                    split:    split.clone(),
                    color,
                    epochs:   series.steps.iter().map(|s| s / opts.iter_per_epoch).collect(),
                    raw:      series.values.clone(),
                    smoothed,
                });
            }
        }

        if let Some(path) = &opts.save_path {
            plot::render_loss_curves(path, &curves, opts.ylim, opts.size)?;
            tracing::info!("Saved loss plot to '{}'", path.display());
        }
        Ok(curves)
    }

    /// Last (smoothed when `smooth > 0`) value of every model/split.
    pub fn final_losses(&self, smooth: f64) -> Result<Vec<(String, String, f64)>> {
        let opts = PlotOptions { smooth, ..PlotOptions::default() };
        Ok(self
            .plot_losses(&opts)?
            .into_iter()
            .filter_map(|c| c.shown().last().map(|v| (c.model_id.clone(), c.split.clone(), *v)))
            .collect())
    }
}

/// `run-<model_id>_summaries_<split>-tag-<tag>.csv` → (model_id, split).
pub fn parse_run_file_name(name: &str) -> Option<(String, String)> {
    let (run, rest) = name.split_once("_summaries_")?;
    let model_id = run.strip_prefix("run-")?;
    let (split, _) = rest.split_once("-tag-")?;
    if model_id.is_empty() || split.is_empty() {
        return None;
    }
    Some((model_id.to_string(), split.to_string()))
}

fn read_series(path: &Path) -> Result<LossSeries> {
    let text = fs::read_to_string(path)?;
    let bad = |reason: String| VocoderError::Corrupt { path: path.to_path_buf(), reason };

    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<String> = lines
        .next()
        .ok_or_else(|| bad("empty file".into()))?
        .split(',')
        .map(|h| h.trim().trim_matches('"').to_string())
        .collect();
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| bad(format!("missing '{name}' column")))
    };
    let (step_col, value_col) = (column("Step")?, column("Value")?);

    let mut series = LossSeries::default();
    for (i, line) in lines.enumerate() {
        let cells: Vec<&str> = line.split(',').map(|c| c.trim().trim_matches('"')).collect();
        let cell = |col: usize| -> Result<f64> {
            cells
                .get(col)
                .and_then(|c| c.parse::<f64>().ok())
                .ok_or_else(|| bad(format!("row {} is not numeric", i + 2)))
        };
        series.steps.push(cell(step_col)?);
        series.values.push(cell(value_col)?);
    }
    Ok(series)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn write_run(root: &Path, model_id: &str, split: &str, rows: &[(u32, f64)]) {
        let dir = root.join("evaluation/fig/training/synth/data");
        fs::create_dir_all(&dir).unwrap();
        let mut csv = String::from("Wall time,Step,Value\n");
        for (step, value) in rows {
            csv.push_str(&format!("1600000000.0,{step},{value}\n"));
        }
        let name = format!("run-{model_id}_summaries_{split}-tag-loss.csv");
        fs::write(dir.join(name), csv).unwrap();
    }

    #[test]
    fn test_smoothing_constant_is_fixed_point() {
        assert_eq!(TrainingEvaluator::get_smoothed(&[1.0, 1.0, 1.0], 0.5), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_smoothing_lags_raw_series() {
        let s = TrainingEvaluator::get_smoothed(&[4.0, 0.0, 0.0], 0.5);
        assert_abs_diff_eq!(s[1], 4.0);
        assert_abs_diff_eq!(s[2], 2.0);
        assert!(TrainingEvaluator::get_smoothed(&[], 0.9).is_empty());
    }

    #[test]
    fn test_parse_run_file_name() {
        assert_eq!(
            parse_run_file_name("run-200101_120000_summaries_valid-tag-loss.csv"),
            Some(("200101_120000".into(), "valid".into()))
        );
        assert_eq!(parse_run_file_name("notes.csv"), None);
    }

    #[test]
    fn test_scan_builds_model_split_map() {
        let root = tempfile::tempdir().unwrap();
        write_run(root.path(), "b", "train", &[(1, 3.0), (2, 2.0)]);
        write_run(root.path(), "b", "valid", &[(2, 2.5)]);
        write_run(root.path(), "a", "train", &[(1, 1.0)]);

        let ev = TrainingEvaluator::with_root(root.path(), "synth").unwrap();
        assert_eq!(ev.model_ids(), vec!["a", "b"]);
        assert_eq!(ev.data()["b"]["train"].values, vec![3.0, 2.0]);
        assert_eq!(ev.data()["b"]["valid"].steps, vec![2.0]);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let ev = TrainingEvaluator::with_root(root.path(), "nothing").unwrap();
        assert!(ev.data().is_empty());
        assert!(TrainingEvaluator::with_root(root.path(), "").is_err());
    }

    #[test]
    fn test_colors_stable_across_subsets() {
        let root = tempfile::tempdir().unwrap();
        for id in ["m1", "m2", "m3"] {
            write_run(root.path(), id, "train", &[(1, 1.0)]);
        }
        let ev = TrainingEvaluator::with_root(root.path(), "synth").unwrap();
        let all = ev.plot_losses(&PlotOptions::default()).unwrap();
        let only = ev
            .plot_losses(&PlotOptions { model_ids: Some(vec!["m3".into()]), ..Default::default() })
            .unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].color, all[2].color);
        assert_eq!(only[0].color, PALETTE[2]);
    }

    #[test]
    fn test_split_filter_and_epochs() {
        let root = tempfile::tempdir().unwrap();
        write_run(root.path(), "m", "train", &[(10, 1.0), (20, 0.5)]);
        write_run(root.path(), "m", "valid", &[(20, 0.8)]);
        let ev = TrainingEvaluator::with_root(root.path(), "synth").unwrap();
        let curves = ev
            .plot_losses(&PlotOptions { plot_split: "train".into(), iter_per_epoch: 10.0, ..Default::default() })
            .unwrap();
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].epochs, vec![1.0, 2.0]);
        assert!(!curves[0].dashed());
        assert!(curves[0].smoothed.is_none());
    }

    #[test]
    fn test_final_losses_and_svg() {
        let root = tempfile::tempdir().unwrap();
        write_run(root.path(), "m", "train", &[(1, 2.0), (2, 1.0), (3, 1.0)]);
        write_run(root.path(), "m", "valid", &[(3, 1.5)]);
        let ev = TrainingEvaluator::with_root(root.path(), "synth").unwrap();

        let finals = ev.final_losses(0.0).unwrap();
        assert_eq!(finals, vec![("m".into(), "train".into(), 1.0), ("m".into(), "valid".into(), 1.5)]);
        assert!(matches!(ev.final_losses(f64::NAN), Err(VocoderError::Config(_))));
        assert!(matches!(ev.final_losses(-0.5), Err(VocoderError::Config(_))));

        let svg = root.path().join("loss.svg");
        let curves = ev
            .plot_losses(&PlotOptions { smooth: 0.5, save_path: Some(svg.clone()), ..Default::default() })
            .unwrap();
        assert!(curves.iter().all(|c| c.smoothed.is_some()));
        assert!(fs::read_to_string(svg).unwrap().contains("<svg"));
    }

    #[test]
    fn test_bad_csv_is_corrupt() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("evaluation/fig/training/synth/data");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("run-x_summaries_train-tag-loss.csv"), "Step,Loss\n1,2\n").unwrap();
        assert!(matches!(
            TrainingEvaluator::with_root(root.path(), "synth"),
            Err(VocoderError::Corrupt { .. })
        ));
    }
}
