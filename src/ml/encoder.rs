// ============================================================
// Layer 5 — Coattention Encoder
// ============================================================
// Builds the fused document/question encoding U consumed by the
// pointer decoder.
//
//   D   = LSTM(doc vectors)                       [batch, m, H]
//   Q'  = LSTM(question vectors)  (same LSTM)     [batch, n, H]
//   Q   = tanh(W_Q Q' + b_Q)                      [batch, n, H]
//   A   = D Qᵀ                                    [batch, m, n]
//   A_Q = softmax over document words             [batch, m, n]
//   A_D = softmax over question words             [batch, m, n]
//   C_Q = A_Qᵀ D                                  [batch, n, H]
//   C_D = A_D [Q ; C_Q]                           [batch, m, 2H]
//   U   = BiLSTM([D ; C_D])                       [batch, m, 2H]
//
// Dropout is applied to D and Q. Padding positions are excluded
// from both softmaxes and zeroed in U. The backward half of the
// BiLSTM reads each document from its last real word, so U for
// one example does not depend on how far its batch is padded.
//
// Reference: Xiong, Zhong & Socher (2017) Dynamic Coattention Networks

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig},
    prelude::*,
    tensor::activation::{softmax, tanh},
};

use crate::ml::decoder::MASK_PENALTY;

/// Inputs for one batch. Masks hold 1.0 for tokens and 0.0 for padding.
#[derive(Debug, Clone)]
pub struct EncoderInput<B: Backend> {
    /// [batch, m, embedding_dim]
    pub document:      Tensor<B, 3>,
    /// [batch, n, embedding_dim]
    pub question:      Tensor<B, 3>,
    /// [batch, m]
    pub document_mask: Tensor<B, 2>,
    /// [batch, n]
    pub question_mask: Tensor<B, 2>,
}

/// Anything that fuses document and question vectors into U.
pub trait Encoder<B: Backend> {
    /// returns [batch, m, 2 × hidden]
    fn encode(&self, input: &EncoderInput<B>) -> Tensor<B, 3>;
}

#[derive(Config, Debug)]
pub struct CoattentionEncoderConfig {
    pub embedding_dim: usize,
    pub hidden_size:   usize,
    #[config(default = 0.3)]
    pub dropout:       f64,
}

impl CoattentionEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CoattentionEncoder<B> {
        let h = self.hidden_size;
        CoattentionEncoder {
            context_lstm:        LstmConfig::new(self.embedding_dim, h, true).init(device),
            question_projection: LinearConfig::new(h, h).init(device),
            fusion_forward:      LstmConfig::new(3 * h, h, true).init(device),
            fusion_backward:     LstmConfig::new(3 * h, h, true).init(device),
            dropout:             DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct CoattentionEncoder<B: Backend> {
    pub context_lstm:        Lstm<B>,
    pub question_projection: Linear<B>,
    pub fusion_forward:      Lstm<B>,
    pub fusion_backward:     Lstm<B>,
    pub dropout:             Dropout,
}

impl<B: Backend> Encoder<B> for CoattentionEncoder<B> {
    fn encode(&self, input: &EncoderInput<B>) -> Tensor<B, 3> {
        let doc_mask = input.document_mask.clone().unsqueeze_dim::<3>(2); // [batch, m, 1]
        let q_mask   = input.question_mask.clone().unsqueeze_dim::<3>(2); // [batch, n, 1]

        let (d, _) = self.context_lstm.forward(input.document.clone(), None);
        let (q, _) = self.context_lstm.forward(input.question.clone(), None);
        let q = tanh(self.question_projection.forward(q));

        let d = self.dropout.forward(d) * doc_mask.clone();
        let q = self.dropout.forward(q) * q_mask.clone();

        let affinity = d.clone().matmul(q.clone().swap_dims(1, 2)); // [batch, m, n]

        // Padding gets a large negative score before each softmax
        let doc_bias = doc_mask.clone().sub_scalar(1.0).mul_scalar(MASK_PENALTY);       // [batch, m, 1]
        let q_bias   = q_mask.swap_dims(1, 2).sub_scalar(1.0).mul_scalar(MASK_PENALTY); // [batch, 1, n]

        let attn_q = softmax(affinity.clone() + doc_bias, 1);
        let attn_d = softmax(affinity + q_bias, 2);

        let context_q = attn_q.swap_dims(1, 2).matmul(d.clone());               // [batch, n, H]
        let context_d = attn_d.matmul(Tensor::cat(vec![q, context_q], 2));      // [batch, m, 2H]

        let fused = Tensor::cat(vec![d, context_d * doc_mask.clone()], 2);       // [batch, m, 3H]

        let (forward, _)  = self.fusion_forward.forward(fused.clone(), None);
        let reversed      = reverse_within_length(fused, &input.document_mask);
        let (backward, _) = self.fusion_backward.forward(reversed, None);
        let backward      = reverse_within_length(backward, &input.document_mask);

        Tensor::cat(vec![forward, backward], 2) * doc_mask
    }
}

/// Reverse the real rows of every sequence and leave padding in place.
///
/// x [batch, m, w], mask [batch, m] → [batch, m, w]
fn reverse_within_length<B: Backend>(x: Tensor<B, 3>, mask: &Tensor<B, 2>) -> Tensor<B, 3> {
    let [batch, len, width] = x.dims();
    let device = x.device();

    let lengths = mask.clone().sum_dim(1).int().expand([batch, len]);
    let positions = Tensor::<B, 1, Int>::arange(0..len as i64, &device)
        .reshape([1, len])
        .expand([batch, len]);

    let is_real = positions.clone().lower(lengths.clone());
    let flipped = lengths.sub_scalar(1) - positions.clone();
    let index   = positions.mask_where(is_real, flipped);

    x.gather(1, index.unsqueeze_dim::<3>(2).expand([batch, len, width]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn input(batch: usize, m: usize, n: usize, dim: usize, doc_lens: &[usize]) -> EncoderInput<TestBackend> {
        let device = Default::default();
        let mut mask = Vec::new();
        for &len in doc_lens {
            mask.extend((0..m).map(|i| if i < len { 1.0f32 } else { 0.0 }));
        }
        EncoderInput {
            document:      Tensor::random([batch, m, dim], Distribution::Normal(0.0, 1.0), &device),
            question:      Tensor::random([batch, n, dim], Distribution::Normal(0.0, 1.0), &device),
            document_mask: Tensor::<TestBackend, 1>::from_floats(mask.as_slice(), &device).reshape([batch, m]),
            question_mask: Tensor::ones([batch, n], &device),
        }
    }

    #[test]
    fn test_encoding_shape() {
        let device = Default::default();
        let encoder = CoattentionEncoderConfig::new(6, 4).init::<TestBackend>(&device);
        let u = encoder.encode(&input(2, 7, 3, 6, &[7, 7]));
        assert_eq!(u.dims(), [2, 7, 8]);
    }

    #[test]
    fn test_padding_rows_are_zero() {
        let device = Default::default();
        let encoder = CoattentionEncoderConfig::new(5, 3).init::<TestBackend>(&device);
        let u = encoder.encode(&input(1, 6, 2, 5, &[4]));
        let padded: Vec<f32> = u.slice([0..1, 4..6, 0..6]).into_data().iter::<f32>().collect();
        assert!(padded.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_reverse_within_length_keeps_padding_in_place() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 3>::from_floats(
            [[[0.0], [1.0], [2.0], [3.0]], [[4.0], [5.0], [6.0], [7.0]]],
            &device,
        );
        let mask = Tensor::<TestBackend, 2>::from_floats(
            [[1.0, 1.0, 1.0, 0.0], [1.0, 1.0, 1.0, 1.0]],
            &device,
        );
        let out: Vec<f32> = reverse_within_length(x, &mask).into_data().iter::<f32>().collect();
        assert_eq!(out, vec![2.0, 1.0, 0.0, 3.0, 7.0, 6.0, 5.0, 4.0]);
    }

    #[test]
    fn test_encoding_ignores_batch_padding() {
        let device = Default::default();
        TestBackend::seed(&device, 11);
        let encoder = CoattentionEncoderConfig::new(3, 4).init::<TestBackend>(&device);

        // Example A has 4 words; padded to 7 it shares a batch with a
        // 7-word example B.
        let a_doc  = Tensor::<TestBackend, 3>::random([1, 4, 3], Distribution::Normal(0.0, 1.0), &device);
        let b_doc  = Tensor::<TestBackend, 3>::random([1, 7, 3], Distribution::Normal(0.0, 1.0), &device);
        let a_q    = Tensor::<TestBackend, 3>::random([1, 2, 3], Distribution::Normal(0.0, 1.0), &device);
        let b_q    = Tensor::<TestBackend, 3>::random([1, 2, 3], Distribution::Normal(0.0, 1.0), &device);

        let alone = encoder.encode(&EncoderInput {
            document:      a_doc.clone(),
            question:      a_q.clone(),
            document_mask: Tensor::ones([1, 4], &device),
            question_mask: Tensor::ones([1, 2], &device),
        });

        let padded_a = Tensor::cat(vec![a_doc, Tensor::zeros([1, 3, 3], &device)], 1);
        let mask = Tensor::<TestBackend, 2>::from_floats(
            [[1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0], [1.0; 7]],
            &device,
        );
        let batched = encoder.encode(&EncoderInput {
            document:      Tensor::cat(vec![padded_a, b_doc], 0),
            question:      Tensor::cat(vec![a_q, b_q], 0),
            document_mask: mask,
            question_mask: Tensor::ones([2, 2], &device),
        });

        let expected: Vec<f32> = alone.into_data().iter::<f32>().collect();
        let got: Vec<f32> = batched
            .slice([0..1, 0..4, 0..8])
            .into_data()
            .iter::<f32>()
            .collect();
        assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(&expected) {
            assert!((g - e).abs() < 1e-5, "{got:?} != {expected:?}");
        }
    }
}
