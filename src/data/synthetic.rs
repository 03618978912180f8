// ============================================================
// Layer 4 — Synthetic Source
// ============================================================
// A seeded, generated corpus for smoke runs and tests.
//
// Every word vector is uniform noise in [-1, 1]. The answer span
// is made recoverable by copying the question's leading vectors
// (plus a little noise) into the document at the span:
//
//   question: q0 q1 q2 q3
//   document: d0 d1 [q0' q1'] d4 d5 ...   → start 2, end 3
//
// The same seed always yields the same corpus.

use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::dataset::DcnSample;
use crate::domain::traits::QaSource;
use crate::error::DcnError;

const MAX_SPAN: usize = 3;
const SPAN_NOISE: f32 = 0.05;

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub num_samples:         usize,
    pub embedding_dim:       usize,
    pub max_document_length: usize,
    pub question_length:     usize,
    pub seed:                u64,
}

impl SyntheticSource {
    pub fn new(num_samples: usize, embedding_dim: usize, seed: u64) -> Self {
        Self {
            num_samples,
            embedding_dim,
            max_document_length: 40,
            question_length:     MAX_SPAN + 2,
            seed,
        }
    }

    pub fn with_max_document_length(mut self, len: usize) -> Self {
        self.max_document_length = len;
        self
    }

    fn noise(rng: &mut StdRng, len: usize) -> Vec<f32> {
        (0..len).map(|_| rng.gen_range(-1.0f32..=1.0)).collect()
    }

    fn sample(&self, rng: &mut StdRng) -> DcnSample {
        let dim = self.embedding_dim;
        let q_len = self.question_length.max(1);
        let min_doc = MAX_SPAN + 1;
        let doc_len = rng.gen_range(min_doc..=self.max_document_length.max(min_doc));

        let span_len = rng.gen_range(1..=MAX_SPAN.min(q_len));
        let start = rng.gen_range(0..=doc_len - span_len);
        let end = start + span_len - 1;

        let question = Self::noise(rng, q_len * dim);
        let mut document = Self::noise(rng, doc_len * dim);
        for k in 0..span_len {
            for d in 0..dim {
                document[(start + k) * dim + d] =
                    question[k * dim + d] + rng.gen_range(-SPAN_NOISE..=SPAN_NOISE);
            }
        }

        DcnSample {
            document,
            question,
            embedding_dim: dim,
            start_position: start,
            end_position: end,
        }
    }
}

impl QaSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn get_data(&self) -> Result<Vec<DcnSample>> {
        if self.embedding_dim == 0 {
            return Err(DcnError::Config("synthetic embedding_dim must be > 0".into()).into());
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let samples: Vec<DcnSample> = (0..self.num_samples).map(|_| self.sample(&mut rng)).collect();
        tracing::info!(
            "Generated {} synthetic samples (dim={}, seed={})",
            samples.len(),
            self.embedding_dim,
            self.seed
        );
        Ok(samples)
    }
}
