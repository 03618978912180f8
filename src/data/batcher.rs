// ============================================================
// Layer 4 — DCN Batcher
// ============================================================
// Implements Burn's Batcher trait to stack DcnSamples into
// padded tensors.
//
//   Input:  N samples, document i has m_i words, question i has n_i
//   Output: documents [N, m, E], questions [N, n, E]
//           with m = max m_i and n = max n_i
//
// Alongside the vectors the batch carries:
//   - masks (1.0 = word, 0.0 = padding) for both sequences
//   - one-hot start/end label distributions over the m positions
//   - the raw spans and document lengths on the host, so a batch
//     with bad labels can be rejected before any tensor math
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::DcnSample;
use crate::error::{DcnError, DcnResult};
use crate::ml::decoder::SpanLabels;
use crate::ml::encoder::EncoderInput;

// ─── DcnBatch ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct DcnBatch<B: Backend> {
    /// Document word vectors — [batch, m, E]
    pub document: Tensor<B, 3>,

    /// Question word vectors — [batch, n, E]
    pub question: Tensor<B, 3>,

    /// [batch, m]
    pub document_mask: Tensor<B, 2>,

    /// [batch, n]
    pub question_mask: Tensor<B, 2>,

    /// One-hot start distribution — [batch, m]
    pub start_labels: Tensor<B, 2>,

    /// One-hot end distribution — [batch, m]
    pub end_labels: Tensor<B, 2>,

    /// Ground-truth (start, end) per sample
    pub spans: Vec<(usize, usize)>,

    /// Unpadded document length per sample
    pub document_lengths: Vec<usize>,
}

impl<B: Backend> DcnBatch<B> {
    /// Reject the batch if any span falls outside its document.
    pub fn validate(&self) -> DcnResult<()> {
        for (i, (&(start, end), &len)) in self.spans.iter().zip(&self.document_lengths).enumerate() {
            if start >= len || end >= len || start > end {
                return Err(DcnError::InvalidLabel {
                    sample: i,
                    reason: format!("span ({start}, {end}) does not fit document of length {len}"),
                });
            }
        }
        Ok(())
    }

    pub fn encoder_input(&self) -> EncoderInput<B> {
        EncoderInput {
            document:      self.document.clone(),
            question:      self.question.clone(),
            document_mask: self.document_mask.clone(),
            question_mask: self.question_mask.clone(),
        }
    }

    pub fn labels(&self) -> SpanLabels<B> {
        SpanLabels {
            start: self.start_labels.clone(),
            end:   self.end_labels.clone(),
        }
    }
}

// ─── DcnBatcher ───────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct DcnBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> DcnBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

/// Copy `rows` vectors of width `dim` into a zero buffer padded to `max_len` rows.
fn pad_into(dst: &mut Vec<f32>, src: &[f32], max_len: usize, dim: usize) {
    let start = dst.len();
    dst.extend_from_slice(src);
    dst.resize(start + max_len * dim, 0.0);
}

fn mask_row(dst: &mut Vec<f32>, len: usize, max_len: usize) {
    dst.extend((0..max_len).map(|i| if i < len { 1.0 } else { 0.0 }));
}

fn one_hot_row(dst: &mut Vec<f32>, position: usize, max_len: usize) {
    dst.extend((0..max_len).map(|i| if i == position { 1.0 } else { 0.0 }));
}

impl<B: Backend> Batcher<B, DcnSample, DcnBatch<B>> for DcnBatcher<B> {
    fn batch(&self, items: Vec<DcnSample>, _device: &B::Device) -> DcnBatch<B> {
        let batch_size = items.len();
        // Rows are counted with the batch-wide width
        let dim   = items.first().map(|s| s.embedding_dim).unwrap_or(1).max(1);
        let rows  = |buf: &[f32]| buf.len() / dim;
        let max_m = items.iter().map(|s| rows(&s.document)).max().unwrap_or(1).max(1);
        let max_n = items.iter().map(|s| rows(&s.question)).max().unwrap_or(1).max(1);

        let mut doc_flat   = Vec::with_capacity(batch_size * max_m * dim);
        let mut q_flat     = Vec::with_capacity(batch_size * max_n * dim);
        let mut doc_mask   = Vec::with_capacity(batch_size * max_m);
        let mut q_mask     = Vec::with_capacity(batch_size * max_n);
        let mut start_flat = Vec::with_capacity(batch_size * max_m);
        let mut end_flat   = Vec::with_capacity(batch_size * max_m);
        let mut spans      = Vec::with_capacity(batch_size);
        let mut lengths    = Vec::with_capacity(batch_size);

        for s in &items {
            let m = rows(&s.document);
            let n = rows(&s.question);
            pad_into(&mut doc_flat, &s.document[..m * dim], max_m, dim);
            pad_into(&mut q_flat, &s.question[..n * dim], max_n, dim);
            mask_row(&mut doc_mask, m, max_m);
            mask_row(&mut q_mask, n, max_n);
            one_hot_row(&mut start_flat, s.start_position, max_m);
            one_hot_row(&mut end_flat, s.end_position, max_m);
            spans.push((s.start_position, s.end_position));
            lengths.push(m);
        }

        let d = &self.device;
        DcnBatch {
            document:      Tensor::<B, 1>::from_floats(doc_flat.as_slice(), d).reshape([batch_size, max_m, dim]),
            question:      Tensor::<B, 1>::from_floats(q_flat.as_slice(), d).reshape([batch_size, max_n, dim]),
            document_mask: Tensor::<B, 1>::from_floats(doc_mask.as_slice(), d).reshape([batch_size, max_m]),
            question_mask: Tensor::<B, 1>::from_floats(q_mask.as_slice(), d).reshape([batch_size, max_n]),
            start_labels:  Tensor::<B, 1>::from_floats(start_flat.as_slice(), d).reshape([batch_size, max_m]),
            end_labels:    Tensor::<B, 1>::from_floats(end_flat.as_slice(), d).reshape([batch_size, max_m]),
            spans,
            document_lengths: lengths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn sample(doc_len: usize, q_len: usize, start: usize, end: usize) -> DcnSample {
        DcnSample {
            document:       (0..doc_len * 2).map(|v| v as f32 + 1.0).collect(),
            question:       vec![1.0; q_len * 2],
            embedding_dim:  2,
            start_position: start,
            end_position:   end,
        }
    }

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_batch_pads_to_longest() {
        let batcher = DcnBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![sample(3, 2, 0, 1), sample(5, 4, 2, 4)], &batcher.device);

        assert_eq!(batch.document.dims(), [2, 5, 2]);
        assert_eq!(batch.question.dims(), [2, 4, 2]);
        assert_eq!(batch.document_lengths, vec![3, 5]);
        assert_eq!(
            values(batch.document_mask.clone()),
            vec![1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]
        );
        // Padded rows of the short document are zero
        let padded = values(batch.document.slice([0..1, 3..5, 0..2]));
        assert!(padded.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_labels_are_one_hot() {
        let batcher = DcnBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![sample(4, 1, 1, 3)], &batcher.device);
        assert_eq!(values(batch.start_labels.clone()), vec![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(values(batch.end_labels.clone()), vec![0.0, 0.0, 0.0, 1.0]);
        assert!(batch.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_span_past_document() {
        let batcher = DcnBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![sample(3, 1, 0, 0), sample(2, 1, 1, 4)], &batcher.device);
        let err = batch.validate().unwrap_err();
        assert!(err.is_data());
        assert!(matches!(err, DcnError::InvalidLabel { sample: 1, .. }));
    }

    #[test]
    fn test_mixed_width_batch_stays_in_bounds() {
        let batcher = DcnBatcher::<TestBackend>::new(Default::default());
        let narrow = DcnSample {
            document:       vec![1.0; 3],
            question:       vec![1.0; 1],
            embedding_dim:  1,
            start_position: 0,
            end_position:   2,
        };
        let batch = batcher.batch(vec![sample(2, 1, 0, 1), narrow], &batcher.device);
        assert_eq!(batch.document.dims(), [2, 2, 2]);
        assert_eq!(batch.document_lengths, vec![2, 1]);
        assert!(batch.validate().unwrap_err().is_data());
    }
}
