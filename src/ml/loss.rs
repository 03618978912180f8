// ============================================================
// Layer 5 — Loss Accumulation
// ============================================================
// Cross-entropy over candidate positions and the additive
// accumulator used by the decoder loop.
//
//   CE(logits, labels) = mean_b( -Σ_l label[b,l] · log_softmax(logits)[b,l] )
//
// Labels are full distributions over document positions, so
// both one-hot targets and soft targets are accepted.
// Every decoding step adds CE(alphas) + CE(betas) with equal
// weight, step 0 included.

use burn::{prelude::*, tensor::activation::log_softmax};

use crate::error::{DcnError, DcnResult};

/// Cross-entropy with logits against a label distribution.
///
/// logits, labels: [batch, doc_len] → scalar tensor [1]
pub fn span_cross_entropy<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    (labels * log_probs).sum_dim(1).neg().mean()
}

/// Sums per-step losses. Starts empty and is reset by
/// constructing a new one for each batch.
#[derive(Debug)]
pub struct LossAccumulator<B: Backend> {
    total: Option<Tensor<B, 1>>,
    steps: usize,
}

impl<B: Backend> Default for LossAccumulator<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> LossAccumulator<B> {
    pub fn new() -> Self {
        Self { total: None, steps: 0 }
    }

    pub fn add(&mut self, step_loss: Tensor<B, 1>) {
        self.total = Some(match self.total.take() {
            Some(total) => total + step_loss,
            None        => step_loss,
        });
        self.steps += 1;
    }

    /// Number of step losses added so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The accumulated loss, or None if no step was added
    pub fn total(self) -> Option<Tensor<B, 1>> {
        self.total
    }
}

/// Reject NaN / ±Inf so they never reach the optimizer.
pub fn ensure_finite(what: &'static str, value: f64) -> DcnResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DcnError::NonFinite { what, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn scalar(t: Tensor<TestBackend, 1>) -> f64 {
        t.into_scalar().elem::<f64>()
    }

    #[test]
    fn test_uniform_logits_give_log_len() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([2, 4], &device);
        let labels = Tensor::<TestBackend, 2>::from_floats(
            [[0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]],
            &device,
        );
        let loss = scalar(span_cross_entropy(logits, labels));
        assert!((loss - 4.0_f64.ln()).abs() < 1e-5, "loss = {loss}");
    }

    #[test]
    fn test_confident_correct_logits_give_small_loss() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 20.0]], &device);
        let labels = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 1.0]], &device);
        let loss = scalar(span_cross_entropy(logits, labels));
        assert!(loss > 0.0 && loss < 1e-6);
    }

    #[test]
    fn test_soft_labels_are_accepted() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([1, 2], &device);
        let labels = Tensor::<TestBackend, 2>::from_floats([[0.5, 0.5]], &device);
        let loss = scalar(span_cross_entropy(logits, labels));
        assert!((loss - 2.0_f64.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_accumulator_sums_every_step() {
        let device = Default::default();
        let mut acc = LossAccumulator::<TestBackend>::new();
        assert_eq!(acc.steps(), 0);
        for v in [0.5_f32, 1.25, 2.0] {
            acc.add(Tensor::from_floats([v], &device));
        }
        assert_eq!(acc.steps(), 3);
        let total = scalar(acc.total().unwrap());
        assert!((total - 3.75).abs() < 1e-6);
    }

    #[test]
    fn test_empty_accumulator_has_no_total() {
        let acc = LossAccumulator::<TestBackend>::new();
        assert!(acc.total().is_none());
    }

    #[test]
    fn test_ensure_finite() {
        assert_eq!(ensure_finite("loss", 1.5), Ok(1.5));
        assert!(ensure_finite("loss", f64::INFINITY).unwrap_err().is_numeric());
        assert!(ensure_finite("loss", f64::NAN).unwrap_err().is_numeric());
    }
}
