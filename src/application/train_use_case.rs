// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training (or evaluation) run:
//
//   Step 1: Validate the configuration   (fails before any I/O)
//   Step 2: Load samples from the source (Layer 4 - data)
//   Step 3: Train / validation split     (Layer 4 - data)
//   Step 4: Open the run's checkpoints   (Layer 6 - infra)
//   Step 5: Run the training loop        (Layer 5 - ml)
//
// With `test` set, step 5 only evaluates the latest checkpoint.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    dataset::{retain_valid, DcnDataset, DcnSample},
    source::DatasetKind,
    splitter::split_train_val,
    squad::SquadSource,
    synthetic::SyntheticSource,
};
use crate::domain::traits::QaSource;
use crate::error::{DcnError, DcnResult};
use crate::infra::{checkpoint::CheckpointManager, metrics::EpochMetrics};
use crate::ml::model::DcnConfig;
use crate::ml::trainer::run_training;

// ─── Training Configuration ──────────────────────────────────────────────────
// All options for a run. Saved next to the checkpoints so
// prediction can rebuild the same architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub num_epochs:          usize,
    pub batch_size:          usize,
    #[serde(alias = "lstm_size")]
    pub hidden_state_size:   usize,
    pub learning_rate:       f64,
    pub dropout:             f64,
    pub num_decoding_steps:  usize,
    pub restore:             bool,
    pub test:                bool,
    pub dataset:             String,
    pub pool_size:           usize,
    pub embedding_dim:       usize,
    pub max_document_length: usize,
    pub max_question_length: usize,
    pub logit_clip:          f64,
    pub seed:                u64,
    pub train_fraction:      f64,
    pub train_path:          String,
    /// Separate validation file; when absent the training data is split
    pub dev_path:            Option<String>,
    pub glove_path:          String,
    pub checkpoint_dir:      String,
    pub run_id:              String,
    pub synthetic_samples:   usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            num_epochs:          100,
            batch_size:          32,
            hidden_state_size:   200,
            learning_rate:       1e-3,
            dropout:             0.3,
            num_decoding_steps:  4,
            restore:             false,
            test:                false,
            dataset:             "SQuAD".to_string(),
            pool_size:           16,
            embedding_dim:       300,
            max_document_length: 600,
            max_question_length: 60,
            logit_clip:          50.0,
            seed:                42,
            train_fraction:      0.8,
            train_path:          "data/train-v1.1.json".to_string(),
            dev_path:            None,
            glove_path:          "data/glove.840B.300d.txt".to_string(),
            checkpoint_dir:      "checkpoints".to_string(),
            run_id:              "dcn".to_string(),
            synthetic_samples:   512,
        }
    }
}

impl TrainConfig {
    pub fn dataset_kind(&self) -> DcnResult<DatasetKind> {
        self.dataset.parse()
    }

    pub fn model_config(&self) -> DcnConfig {
        DcnConfig::new(self.embedding_dim, self.hidden_state_size)
            .with_pool_size(self.pool_size)
            .with_dropout(self.dropout)
            .with_num_decoding_steps(self.num_decoding_steps)
            .with_logit_clip(self.logit_clip)
    }

    /// Reject bad settings before anything is loaded or allocated.
    pub fn validate(&self) -> DcnResult<()> {
        let bad = |msg: String| Err(DcnError::Config(msg));

        if self.num_decoding_steps == 0 {
            return bad("num_decoding_steps must be >= 1".into());
        }
        if self.batch_size == 0 {
            return bad("batch_size must be > 0".into());
        }
        if self.hidden_state_size == 0 || self.embedding_dim == 0 || self.pool_size == 0 {
            return bad("hidden_state_size, embedding_dim and pool_size must be > 0".into());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return bad(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return bad(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        if !(self.train_fraction > 0.0 && self.train_fraction <= 1.0) {
            return bad(format!("train_fraction must be in (0, 1], got {}", self.train_fraction));
        }
        if self.max_document_length == 0 || self.max_question_length == 0 {
            return bad("max_document_length and max_question_length must be > 0".into());
        }
        if self.run_id.is_empty() || self.run_id.contains(['/', '\\']) {
            return bad(format!("run_id '{}' is not a plain directory name", self.run_id));
        }
        self.dataset_kind()?;
        self.model_config().decoder_settings()?;
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    /// Validates eagerly, so an invalid config never constructs a use case.
    pub fn new(config: TrainConfig) -> DcnResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    fn source_for(&self, path: &str) -> DcnResult<Box<dyn QaSource>> {
        let cfg = &self.config;
        Ok(match cfg.dataset_kind()? {
            DatasetKind::Squad => Box::new(SquadSource {
                path:                PathBuf::from(path),
                glove_path:          PathBuf::from(&cfg.glove_path),
                embedding_dim:       cfg.embedding_dim,
                max_document_length: cfg.max_document_length,
                max_question_length: cfg.max_question_length,
            }),
            DatasetKind::Synthetic => Box::new(
                SyntheticSource::new(cfg.synthetic_samples, cfg.embedding_dim, cfg.seed)
                    .with_max_document_length(cfg.max_document_length),
            ),
        })
    }

    /// Training and validation samples. Samples with a wrong width,
    /// a ragged buffer or an out-of-range span are dropped here.
    fn load_samples(&self) -> Result<(Vec<DcnSample>, Vec<DcnSample>)> {
        let cfg    = &self.config;
        let source = self.source_for(&cfg.train_path)?;

        tracing::info!("Loading '{}' data", source.name());
        let samples = self.usable(source.get_data()?, "training");
        tracing::info!("Loaded {} samples", samples.len());

        match (&cfg.dev_path, cfg.dataset_kind()?) {
            (Some(dev), DatasetKind::Squad) => {
                let val = self.usable(self.source_for(dev)?.get_data()?, "validation");
                Ok((samples, val))
            }
            _ => Ok(split_train_val(samples, cfg.train_fraction, cfg.seed)),
        }
    }

    fn usable(&self, samples: Vec<DcnSample>, split: &str) -> Vec<DcnSample> {
        let (kept, dropped) = retain_valid(samples, self.config.embedding_dim);
        if dropped > 0 {
            tracing::warn!("Dropped {dropped} invalid {split} samples");
        }
        kept
    }

    pub fn execute(&self) -> Result<Vec<EpochMetrics>> {
        let cfg = &self.config;

        let (train_samples, val_samples) = self.load_samples()?;
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );
        if train_samples.is_empty() && !cfg.test {
            anyhow::bail!("No usable training samples");
        }

        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir, &cfg.run_id)?;
        if !cfg.test {
            ckpt_manager.save_config(cfg)?;
        }

        run_training(
            cfg,
            DcnDataset::new(train_samples),
            DcnDataset::new(val_samples),
            ckpt_manager,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.num_epochs, 100);
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.hidden_state_size, 200);
        assert_eq!(cfg.num_decoding_steps, 4);
        assert_eq!(cfg.dataset_kind().unwrap(), DatasetKind::Squad);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_steps_rejected_before_construction() {
        let cfg = TrainConfig { num_decoding_steps: 0, ..Default::default() };
        assert!(TrainUseCase::new(cfg).err().map_or(false, |e| e.is_config()));
    }

    #[test]
    fn test_unknown_dataset_rejected() {
        let cfg = TrainConfig { dataset: "CoQA".into(), ..Default::default() };
        assert_eq!(cfg.validate(), Err(DcnError::UnsupportedDataset("CoQA".into())));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        for cfg in [
            TrainConfig { batch_size: 0, ..Default::default() },
            TrainConfig { learning_rate: 0.0, ..Default::default() },
            TrainConfig { dropout: 1.0, ..Default::default() },
            TrainConfig { train_fraction: 0.0, ..Default::default() },
            TrainConfig { logit_clip: -1.0, ..Default::default() },
            TrainConfig { run_id: "a/b".into(), ..Default::default() },
        ] {
            assert!(cfg.validate().unwrap_err().is_config(), "{cfg:?}");
        }
    }

    #[test]
    fn test_usable_filters_by_configured_width() {
        let cfg = TrainConfig { embedding_dim: 2, dataset: "synthetic".into(), ..Default::default() };
        let use_case = TrainUseCase::new(cfg).unwrap();
        let good = DcnSample {
            document:       vec![0.1; 4 * 2],
            question:       vec![0.1; 2 * 2],
            embedding_dim:  2,
            start_position: 1,
            end_position:   2,
        };
        let wrong_width = DcnSample { embedding_dim: 1, ..good.clone() };
        let ragged      = DcnSample { question: vec![0.1; 3], ..good.clone() };
        let bad_label   = DcnSample { end_position: 4, ..good.clone() };

        let kept = use_case.usable(vec![wrong_width, good, ragged, bad_label], "training");
        assert_eq!(kept.len(), 1);
        assert_eq!((kept[0].start_position, kept[0].end_position), (1, 2));
    }

    #[test]
    fn test_synthetic_samples_survive_loading() {
        let cfg = TrainConfig {
            embedding_dim:       3,
            dataset:             "synthetic".into(),
            synthetic_samples:   20,
            max_document_length: 10,
            train_fraction:      0.75,
            ..Default::default()
        };
        let (train, val) = TrainUseCase::new(cfg).unwrap().load_samples().unwrap();
        assert_eq!(train.len() + val.len(), 20);
    }

    #[test]
    fn test_lstm_size_alias_in_json() {
        let cfg: TrainConfig =
            serde_json::from_str(r#"{ "lstm_size": 64, "dataset": "synthetic" }"#).unwrap();
        assert_eq!(cfg.hidden_state_size, 64);
        assert_eq!(cfg.num_epochs, 100);
        assert_eq!(cfg.model_config().hidden_size, 64);
    }
}
