// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the classifier using Burn's CompactRecorder.
//
// A checkpoint directory holds two files:
//   1. model_config.json — PneumoniaCnnConfig (architecture)
//   2. model.mpk         — all learned parameters
//
// The config is read first so the exact architecture can be
// rebuilt before the weights are loaded into it; loading fails
// if the two disagree.
//
// Loading errors surface as DetectionError::ModelLoad. Saving is
// only done by `init` and tests, so it reports through anyhow.
// `init_checkpoint` writes a randomly initialised model and
// refuses to replace an existing config unless forced.
//
// File layout:
//   models/
//     model_config.json
//     model.mpk
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::Context;
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::domain::error::{DetectionError, Result};
use crate::domain::prediction::NUM_CLASSES;
use crate::ml::model::{PneumoniaCnn, PneumoniaCnnConfig};

const CONFIG_FILE:  &str = "model_config.json";
// Without extension, the recorder adds it
const WEIGHTS_FILE: &str = "model";

/// Reads and writes classifier checkpoints in one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Nothing is touched on disk until something is saved.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dir_display(&self) -> String {
        self.dir.display().to_string()
    }

    /// Save model weights to {dir}/model.mpk.
    pub fn save_model<B: Backend>(&self, model: &PneumoniaCnn<B>) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let path = self.dir.join(WEIGHTS_FILE);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved weights to '{}'", path.display());
        Ok(())
    }

    /// Load weights into a model built from the matching config.
    pub fn load_model<B: Backend>(
        &self,
        model:  PneumoniaCnn<B>,
        device: &B::Device,
    ) -> Result<PneumoniaCnn<B>> {
        let path = self.dir.join(WEIGHTS_FILE);
        tracing::info!("Loading weights from '{}'", path.display());

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .map_err(|e| DetectionError::model_load(path.display().to_string(), e))?;

        Ok(model.load_record(record))
    }

    /// Save the architecture config as pretty JSON.
    pub fn save_config(&self, cfg: &PneumoniaCnnConfig) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    /// Write config and freshly initialised weights for `cfg`.
    pub fn init_checkpoint(&self, cfg: &PneumoniaCnnConfig, force: bool) -> anyhow::Result<()> {
        cfg.validate(NUM_CLASSES)
            .map_err(|reason| anyhow::anyhow!("Invalid model config: {reason}"))?;

        let config_path = self.dir.join(CONFIG_FILE);
        if config_path.exists() && !force {
            anyhow::bail!(
                "'{}' already exists (use --force to replace it)",
                config_path.display()
            );
        }

        let device = Default::default();
        let model: PneumoniaCnn<burn::backend::NdArray> = cfg.init(&device);
        self.save_config(cfg)?;
        self.save_model(&model)?;

        tracing::info!("Initialised untrained checkpoint in '{}'", self.dir.display());
        Ok(())
    }

    /// Load the architecture config written by `save_config`.
    pub fn load_config(&self) -> Result<PneumoniaCnnConfig> {
        let path    = self.dir.join(CONFIG_FILE);
        let display = path.display().to_string();

        let json = fs::read_to_string(&path).map_err(|e| DetectionError::model_load(&display, e))?;
        serde_json::from_str(&json).map_err(|e| DetectionError::model_load(display, e))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tensor::InputTensor;
    use crate::domain::traits::ClassifierPort;
    use crate::ml::{inferencer::BurnClassifier, CpuBackend};

    fn tiny() -> PneumoniaCnnConfig {
        PneumoniaCnnConfig::new()
            .with_base_channels(2)
            .with_num_blocks(2)
            .with_dense_units(4)
    }

    #[test]
    fn test_config_roundtrip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path());
        ckpt.save_config(&tiny()).unwrap();

        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.base_channels, 2);
        assert_eq!(loaded.num_blocks, 2);
        assert_eq!(loaded.dense_units, 4);
        assert_eq!(loaded.num_classes, 3);
    }

    #[test]
    fn test_missing_directory_is_model_load_error() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("nope"));
        assert!(matches!(ckpt.load_config(), Err(DetectionError::ModelLoad { .. })));
        assert!(!dir.path().join("nope").exists());
    }

    #[test]
    fn test_corrupt_config_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        let ckpt = CheckpointManager::new(dir.path());
        assert!(matches!(ckpt.load_config(), Err(DetectionError::ModelLoad { .. })));
    }

    #[test]
    fn test_config_without_weights_fails_to_load() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path());
        ckpt.save_config(&tiny()).unwrap();

        let result = BurnClassifier::<CpuBackend>::from_checkpoint(&ckpt, Default::default());
        assert!(matches!(result, Err(DetectionError::ModelLoad { .. })));
    }

    #[test]
    fn test_saved_classifier_reloads() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path());
        let device = Default::default();
        let model: PneumoniaCnn<CpuBackend> = tiny().init(&device);
        ckpt.save_config(&tiny()).unwrap();
        ckpt.save_model(&model).unwrap();

        let input    = InputTensor::new(16, 16, vec![0.5; 256]).unwrap();
        let original = BurnClassifier::new(model, device).forward(&input).unwrap();
        let reloaded = BurnClassifier::<CpuBackend>::from_checkpoint(&ckpt, Default::default())
            .unwrap()
            .forward(&input)
            .unwrap();

        // weights are stored at half precision
        for (a, b) in original.0.iter().zip(reloaded.0.iter()) {
            assert!((a - b).abs() < 1e-2);
        }
    }

    #[test]
    fn test_init_checkpoint_is_loadable() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("models"));
        ckpt.init_checkpoint(&tiny(), false).unwrap();

        let clf = BurnClassifier::<CpuBackend>::from_checkpoint(&ckpt, Default::default()).unwrap();
        assert_eq!(clf.layer_names(), vec!["conv1", "conv2"]);

        let input = InputTensor::new(16, 16, vec![0.5; 256]).unwrap();
        let probs = clf.forward(&input).unwrap();
        assert!((probs.sum() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_init_checkpoint_keeps_existing_without_force() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path());
        ckpt.init_checkpoint(&tiny(), false).unwrap();

        let wider = tiny().with_base_channels(4);
        assert!(ckpt.init_checkpoint(&wider, false).is_err());
        assert_eq!(ckpt.load_config().unwrap().base_channels, 2);

        ckpt.init_checkpoint(&wider, true).unwrap();
        assert_eq!(ckpt.load_config().unwrap().base_channels, 4);
    }

    #[test]
    fn test_init_checkpoint_rejects_invalid_config() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("models"));
        assert!(ckpt.init_checkpoint(&tiny().with_num_blocks(0), false).is_err());
        assert!(!dir.path().join("models").exists());
    }
}
