// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Summarises exported training runs for one dataset name:
// final (optionally smoothed) loss per model and split, plus an
// optional SVG of the loss curves.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::infra::evaluation::{PlotOptions, TrainingEvaluator};

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
    /// Directory that contains `evaluation/fig/training/`.
    pub root:           PathBuf,
    pub data_name:      String,
    pub model_ids:      Option<Vec<String>>,
    pub smooth:         f64,
    pub iter_per_epoch: f64,
    pub plot_split:     String,
    pub ylim:           Option<(f64, f64)>,
    pub save_path:      Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalLoss {
    pub model_id: String,
    pub split:    String,
    pub epoch:    f64,
    pub value:    f64,
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<FinalLoss>> {
        let cfg = &self.config;
        let evaluator = TrainingEvaluator::with_root(&cfg.root, &cfg.data_name)
            .with_context(|| format!("Cannot scan training runs for '{}'", cfg.data_name))?;

        let opts = PlotOptions {
            model_ids:      cfg.model_ids.clone(),
            smooth:         cfg.smooth,
            iter_per_epoch: cfg.iter_per_epoch,
            plot_split:     cfg.plot_split.clone(),
            ylim:           cfg.ylim,
            save_path:      cfg.save_path.clone(),
            ..PlotOptions::default()
        };
        let curves = evaluator.plot_losses(&opts).context("Cannot plot losses")?;

        Ok(curves
            .iter()
            .filter_map(|c| {
                let epoch = *c.epochs.last()?;
                let value = *c.shown().last()?;
                Some(FinalLoss { model_id: c.model_id.clone(), split: c.split.clone(), epoch, value })
            })
            .collect())
    }
}
