use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::error::{DcnError, DcnResult};

/// One embedded training example.
/// Document and question are stored row-major as
/// [len, embedding_dim] word vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcnSample {
    pub document:       Vec<f32>,
    pub question:       Vec<f32>,
    pub embedding_dim:  usize,
    pub start_position: usize,
    pub end_position:   usize,
}

impl DcnSample {
    pub fn document_len(&self) -> usize {
        self.document.len() / self.embedding_dim.max(1)
    }

    pub fn question_len(&self) -> usize {
        self.question.len() / self.embedding_dim.max(1)
    }

    /// Check vector layout and that the span lies inside the document.
    /// `index` only labels the error.
    pub fn validate(&self, index: usize) -> DcnResult<()> {
        let invalid = |reason: String| DcnError::InvalidLabel { sample: index, reason };

        if self.embedding_dim == 0 {
            return Err(DcnError::Data(format!("sample {index} has embedding_dim 0")));
        }
        if self.document.len() % self.embedding_dim != 0 || self.question.len() % self.embedding_dim != 0 {
            return Err(DcnError::Data(format!(
                "sample {index}: vector buffers are not a multiple of embedding_dim {}",
                self.embedding_dim
            )));
        }
        let doc_len = self.document_len();
        if doc_len == 0 || self.question_len() == 0 {
            return Err(DcnError::Data(format!("sample {index} has an empty document or question")));
        }
        if self.start_position >= doc_len {
            return Err(invalid(format!("start {} >= document length {doc_len}", self.start_position)));
        }
        if self.end_position >= doc_len {
            return Err(invalid(format!("end {} >= document length {doc_len}", self.end_position)));
        }
        if self.start_position > self.end_position {
            return Err(invalid(format!(
                "start {} is after end {}",
                self.start_position, self.end_position
            )));
        }
        Ok(())
    }
}

/// Keep the samples that pass `validate` and carry `embedding_dim`.
/// Returns the survivors and the number dropped.
pub fn retain_valid(samples: Vec<DcnSample>, embedding_dim: usize) -> (Vec<DcnSample>, usize) {
    let total = samples.len();
    let kept: Vec<DcnSample> = samples
        .into_iter()
        .enumerate()
        .filter_map(|(i, s)| {
            let checked = if s.embedding_dim != embedding_dim {
                Err(DcnError::Data(format!(
                    "sample {i} has embedding_dim {}, expected {embedding_dim}",
                    s.embedding_dim
                )))
            } else {
                s.validate(i)
            };
            match checked {
                Ok(()) => Some(s),
                Err(e) => {
                    tracing::debug!("Dropping sample: {e}");
                    None
                }
            }
        })
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

pub struct DcnDataset {
    samples: Vec<DcnSample>,
}

impl DcnDataset {
    pub fn new(samples: Vec<DcnSample>) -> Self { Self { samples } }
}

impl Dataset<DcnSample> for DcnDataset {
    fn get(&self, index: usize) -> Option<DcnSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
