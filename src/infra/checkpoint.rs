// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores every DCN parameter as one unit using
// Burn's CompactRecorder: encoder, decoder LSTM, and both HMN
// estimators live in the same record.
//
// Layout, one directory per run identifier:
//
//   checkpoints/
//     <run_id>/
//       model_epoch_1.mpk.gz   ← weights after epoch 1
//       model_epoch_2.mpk.gz
//       latest_epoch.json      ← number of the newest epoch
//       train_config.json      ← TrainConfig, to rebuild the model
//       metrics.csv            ← written by MetricsLogger
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::DcnModel;

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Open (and create) `<root>/<run_id>`.
    pub fn new(root: impl AsRef<Path>, run_id: &str) -> Result<Self> {
        let dir = root.as_ref().join(run_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_model<B: Backend>(&self, model: &DcnModel<B>, epoch: usize) -> Result<()> {
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join("latest_epoch.json");
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| "Failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the newest checkpoint into `model` (which must have the
    /// saved architecture). Returns the model and its epoch.
    pub fn load_model<B: Backend>(
        &self,
        model:  DcnModel<B>,
        device: &B::Device,
    ) -> Result<(DcnModel<B>, usize)> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok((model.load_record(record), epoch))
    }

    pub fn has_checkpoint(&self) -> bool {
        self.dir.join("latest_epoch.json").exists()
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");

        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'predict'.",
                path.display()
            )
        })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }

    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");

        let s = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Have you run 'train' first?", path.display())
        })?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
