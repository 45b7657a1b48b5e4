// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores decoder weights with Burn's named MessagePack
// recorder at full precision, so a restore gives back the exact
// parameters that were saved.
//
// Files kept in a checkpoint directory:
//   ckpt-<step>.mpk          weights after training step <step>
//   latest_checkpoint.json   step number of the newest weights
//   model_config.json        ModelConfig used to build the model
//
// The config is stored next to the weights so a model can be
// rebuilt with the same architecture before the record is loaded.
// Loading into a module of a different shape fails.

use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};

use crate::domain::error::{Result, VocoderError};
use crate::ml::config::ModelConfig;

pub const LATEST_FILE: &str = "latest_checkpoint.json";
pub const CONFIG_FILE: &str = "model_config.json";

type WeightsRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Does not touch the filesystem; directories are created on save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the weights for `step`, without the recorder's extension.
    pub fn weights_path(&self, step: usize) -> PathBuf {
        self.dir.join(format!("ckpt-{step}"))
    }

    /// Write the module record for `step` and move the latest pointer to it.
    pub fn save_weights<B: Backend, M: Module<B>>(&self, module: &M, step: usize) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.weights_path(step);

        WeightsRecorder::new()
            .record(module.clone().into_record(), path.clone())
            .map_err(|e| {
                VocoderError::Checkpoint(format!("cannot save '{}': {e}", path.display()))
            })?;

        fs::write(self.dir.join(LATEST_FILE), step.to_string())?;
        tracing::debug!("Saved checkpoint: step {}", step);
        Ok(())
    }

    /// Load the newest record into `module`.
    ///
    /// A directory without `latest_checkpoint.json` yields an Io error.
    pub fn load_weights<B: Backend, M: Module<B>>(&self, module: M, device: &B::Device) -> Result<M> {
        let step = self.latest_step()?;
        let path = self.weights_path(step);

        tracing::info!("Loading checkpoint step {} from '{}'", step, self.dir.display());

        let record = WeightsRecorder::new()
            .load(path.clone(), device)
            .map_err(|e| {
                VocoderError::Checkpoint(format!("cannot load '{}': {e}", path.display()))
            })?;

        Ok(module.load_record(record))
    }

    pub fn save_config(&self, cfg: &ModelConfig) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)
            .map_err(|e| VocoderError::Checkpoint(e.to_string()))?;
        fs::write(&path, json)?;
        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<ModelConfig> {
        ModelConfig::load(&self.dir.join(CONFIG_FILE))
    }

    pub fn latest_step(&self) -> Result<usize> {
        let s = fs::read_to_string(self.dir.join(LATEST_FILE))?;
        s.trim().parse::<usize>().map_err(|e| {
            VocoderError::Checkpoint(format!("bad {LATEST_FILE} in '{}': {e}", self.dir.display()))
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::{Linear, LinearConfig};

    type B = NdArray;

    #[test]
    fn test_missing_checkpoint_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        let module: Linear<B> = LinearConfig::new(2, 2).init(&Default::default());
        assert!(matches!(
            manager.load_weights::<B, _>(module, &Default::default()),
            Err(VocoderError::Io(_))
        ));
    }

    #[test]
    fn test_save_then_load_restores_weights() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let manager = CheckpointManager::new(dir.path().join("run"));

        let saved: Linear<B> = LinearConfig::new(3, 2).init(&device);
        manager.save_weights::<B, _>(&saved, 7).unwrap();
        assert_eq!(manager.latest_step().unwrap(), 7);
        assert!(dir.path().join("run/ckpt-7.mpk").exists());

        let fresh: Linear<B> = LinearConfig::new(3, 2).init(&device);
        let loaded = manager.load_weights::<B, _>(fresh, &device).unwrap();
        let a: Vec<f32> = saved.weight.val().into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.weight.val().into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        let cfg = ModelConfig::for_model_type("f0_rnn_fc_hpn_decoder");
        manager.save_config(&cfg).unwrap();
        assert_eq!(manager.load_config().unwrap(), cfg);
    }
}
