// ============================================================
// Layer 2 — Predict Use Case
// ============================================================
// Answers a question about a given context paragraph with a
// trained run:
//
//   1. Collect the words of question + context
//   2. Load only those GloVe rows
//   3. Rebuild the model from the run's checkpoint
//   4. Decode the answer span

use anyhow::Result;
use std::{collections::HashSet, path::PathBuf};

use crate::data::{glove::GloveTable, tokenize::tokenize};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::{InferBackend, Inferencer, Prediction};

pub struct PredictUseCase {
    ckpt_manager: CheckpointManager,
    glove_path:   PathBuf,
}

impl PredictUseCase {
    pub fn new(checkpoint_dir: &str, run_id: &str, glove_path: impl Into<PathBuf>) -> Result<Self> {
        let ckpt_manager = CheckpointManager::new(checkpoint_dir, run_id)?;
        if !ckpt_manager.has_checkpoint() {
            anyhow::bail!(
                "No checkpoint for run '{}' in '{}'. Run 'train' first.",
                run_id,
                checkpoint_dir
            );
        }
        Ok(Self { ckpt_manager, glove_path: glove_path.into() })
    }

    pub fn answer(&self, question: &str, context: &str) -> Result<Prediction> {
        let vocab: HashSet<String> = tokenize(question)?
            .into_iter()
            .chain(tokenize(context)?)
            .map(|t| t.text.to_lowercase())
            .collect();

        let glove  = GloveTable::from_path(&self.glove_path, Some(&vocab))?;
        let device = burn::backend::wgpu::WgpuDevice::default();
        let inferencer = Inferencer::<InferBackend>::from_checkpoint(&self.ckpt_manager, glove, device)?;

        inferencer.predict(question, context)
    }
}
