// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Answers one question about one context paragraph:
//
//   tokenize → GloVe vectors → [1, m, E] / [1, n, E] tensors
//            → DcnModel::predict (all decoding steps, no labels)
//            → final (start, end) → answer text from the context
//
// The decoder picks start and end independently, so they can
// cross; a crossed pair is swapped rather than discarded.

use anyhow::{Context, Result};
use burn::prelude::*;

use crate::data::glove::GloveTable;
use crate::data::tokenize::{span_text, tokenize, WordToken};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::encoder::EncoderInput;
use crate::ml::model::DcnModel;

pub type InferBackend = burn::backend::Wgpu;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Inclusive word indices into the (truncated) context
    pub start:  usize,
    pub end:    usize,
    pub answer: String,
}

pub struct Inferencer<B: Backend> {
    model:               DcnModel<B>,
    glove:               GloveTable,
    max_document_length: usize,
    max_question_length: usize,
    device:              B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(
        model:               DcnModel<B>,
        glove:               GloveTable,
        max_document_length: usize,
        max_question_length: usize,
        device:              B::Device,
    ) -> Self {
        Self { model, glove, max_document_length, max_question_length, device }
    }

    /// Rebuild the model from the run's saved TrainConfig and load
    /// the newest weights.
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        glove:        GloveTable,
        device:       B::Device,
    ) -> Result<Self> {
        let cfg = ckpt_manager.load_config()?;
        if glove.dim() != cfg.embedding_dim {
            anyhow::bail!(
                "GloVe vectors have dimension {} but the model was trained with {}",
                glove.dim(),
                cfg.embedding_dim
            );
        }
        let model = cfg.model_config().with_dropout(0.0).init::<B>(&device)?;
        let (model, epoch) = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint (epoch {})", epoch);

        Ok(Self::new(model, glove, cfg.max_document_length, cfg.max_question_length, device))
    }

    fn sequence(&self, tokens: &[WordToken]) -> (Tensor<B, 3>, Tensor<B, 2>) {
        let len  = tokens.len();
        let flat = self.glove.embed(tokens);
        (
            Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device)
                .reshape([1, len, self.glove.dim()]),
            Tensor::ones([1, len], &self.device),
        )
    }

    pub fn predict(&self, question: &str, context: &str) -> Result<Prediction> {
        let mut context_tokens  = tokenize(context)?;
        let mut question_tokens = tokenize(question)?;
        if context_tokens.is_empty() || question_tokens.is_empty() {
            anyhow::bail!("Question and context must both contain at least one word");
        }
        context_tokens.truncate(self.max_document_length);
        question_tokens.truncate(self.max_question_length);

        tracing::debug!(
            "Context coverage {:.1}%, question coverage {:.1}%",
            self.glove.coverage(&context_tokens) * 100.0,
            self.glove.coverage(&question_tokens) * 100.0
        );

        let (document, document_mask) = self.sequence(&context_tokens);
        let (question, question_mask) = self.sequence(&question_tokens);
        let input = EncoderInput { document, question, document_mask, question_mask };

        let output = self.model.predict(&input).context("Decoding failed")?;
        let (mut start, mut end) = output
            .spans()
            .first()
            .copied()
            .context("Decoder returned no span")?;
        if start > end {
            tracing::debug!("Pointers crossed ({start}, {end}); swapping");
            std::mem::swap(&mut start, &mut end);
        }

        let answer = span_text(context, &context_tokens, start, end);
        tracing::debug!("Span [{},{}] answer='{}'", start, end, answer);
        Ok(Prediction { start, end, answer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::DcnConfig;
    use burn::backend::NdArray;
    use std::io::Cursor;

    const VECTORS: &str = "the 0.1 0.2\nbridge 0.9 -0.3\nopened 0.4 0.4\nin -0.2 0.7\n1937 1.0 1.0\nwhen 0.3 -0.8\n";

    fn inferencer() -> Inferencer<NdArray> {
        let device = Default::default();
        let model = DcnConfig::new(2, 4)
            .with_pool_size(2)
            .with_num_decoding_steps(2)
            .init::<NdArray>(&device)
            .unwrap();
        let glove = GloveTable::from_reader(Cursor::new(VECTORS), None).unwrap();
        Inferencer::new(model, glove, 600, 60, device)
    }

    #[test]
    fn test_prediction_is_a_span_of_the_context() {
        let context = "The bridge opened in 1937.";
        let p = inferencer().predict("When did the bridge open?", context).unwrap();
        assert!(p.start <= p.end);
        assert!(p.end < 6);
        assert!(!p.answer.is_empty());
        assert!(context.contains(&p.answer));
    }

    #[test]
    fn test_empty_context_rejected() {
        assert!(inferencer().predict("When?", "   ").is_err());
    }
}
