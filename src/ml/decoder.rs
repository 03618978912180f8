// ============================================================
// Layer 5 — Dynamic Pointer Decoder
// ============================================================
// Iteratively refines the answer span over the fused encoding U.
//
// One decoding step:
//
//   1. input  = [u_s ; u_e]                 (zeros on step 0)
//   2. h_t    = cell(input, state)          (zero state on step 0)
//   3. alphas = start_scorer(U, h_t, u_s, u_e)
//      betas  = end_scorer  (U, h_t, u_s, u_e)
//   4. clip logits, push padding to a large negative value
//   5. s = argmax(alphas), e = argmax(betas)   (lowest index on ties)
//   6. u_s = U[b, s, :], u_e = U[b, e, :]
//   7. loss += CE(alphas, start) + CE(betas, end)
//
// After `num_steps` steps the last (s, e) is the predicted span and
// the accumulated loss covers every step, the first one included.
//
// Shapes:
//   U       [batch, L, 2H]
//   mask    [batch, L]       1.0 = token, 0.0 = padding
//   labels  [batch, L]       distributions over positions
//   u_s/u_e [batch, 2H]
//   h_t     [batch, H]

use burn::prelude::*;

use crate::error::{DcnError, DcnResult};
use crate::ml::cell::{DecoderCell, RecurrentState};
use crate::ml::hmn::PositionScorer;
use crate::ml::loss::{ensure_finite, span_cross_entropy, LossAccumulator};

/// Logit offset applied to padding positions
pub const MASK_PENALTY: f64 = 1.0e9;

// ─── Settings ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderSettings {
    pub num_steps:   usize,
    pub hidden_size: usize,
    /// Scores are clamped to [-logit_clip, logit_clip]; 0 disables clipping
    pub logit_clip:  f64,
}

impl DecoderSettings {
    pub fn new(num_steps: usize, hidden_size: usize, logit_clip: f64) -> DcnResult<Self> {
        if num_steps == 0 {
            return Err(DcnError::Config(
                "num_decoding_steps must be at least 1".into(),
            ));
        }
        if hidden_size == 0 {
            return Err(DcnError::Config("hidden_size must be positive".into()));
        }
        if !logit_clip.is_finite() || logit_clip < 0.0 {
            return Err(DcnError::Config(format!(
                "logit_clip must be a finite non-negative number, got {logit_clip}"
            )));
        }
        Ok(Self { num_steps, hidden_size, logit_clip })
    }
}

// ─── Inputs / outputs ─────────────────────────────────────────────────────────
/// Ground-truth start/end distributions, read-only across steps.
#[derive(Debug, Clone)]
pub struct SpanLabels<B: Backend> {
    pub start: Tensor<B, 2>,
    pub end:   Tensor<B, 2>,
}

/// Everything one step produced.
#[derive(Debug, Clone)]
pub struct DecodingStep<B: Backend> {
    pub step:        usize,
    /// Guesses fed into this step
    pub prev_start:  Tensor<B, 2>,
    pub prev_end:    Tensor<B, 2>,
    pub alphas:      Tensor<B, 2>,
    pub betas:       Tensor<B, 2>,
    pub start_index: Tensor<B, 1, Int>,
    pub end_index:   Tensor<B, 1, Int>,
    /// Guesses selected by this step
    pub u_s:         Tensor<B, 2>,
    pub u_e:         Tensor<B, 2>,
    pub loss:        Option<Tensor<B, 1>>,
}

#[derive(Debug, Clone)]
pub struct DecoderOutput<B: Backend> {
    /// Sum of every step's loss; None when decoding without labels
    pub loss:        Option<Tensor<B, 1>>,
    pub start_index: Tensor<B, 1, Int>,
    pub end_index:   Tensor<B, 1, Int>,
    pub steps:       Vec<DecodingStep<B>>,
}

impl<B: Backend> DecoderOutput<B> {
    /// Read the loss back to the host and reject NaN / Inf.
    pub fn checked_loss(&self) -> DcnResult<Option<f64>> {
        match &self.loss {
            Some(loss) => {
                let value = loss.clone().into_scalar().elem::<f64>();
                ensure_finite("loss", value).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Final predicted (start, end) per batch element
    pub fn spans(&self) -> Vec<(usize, usize)> {
        let starts = index_values(self.start_index.clone());
        let ends   = index_values(self.end_index.clone());
        starts.into_iter().zip(ends).collect()
    }
}

// ─── Decoder loop ─────────────────────────────────────────────────────────────
/// Borrowing view over the recurrent cell and the two scorers.
///
/// The start and end scorers are separate objects; the loop never
/// routes one pointer's scores through the other's parameters.
pub struct DecoderLoop<'a, B: Backend, S: PositionScorer<B>> {
    cell:         &'a DecoderCell<B>,
    start_scorer: &'a S,
    end_scorer:   &'a S,
    settings:     DecoderSettings,
}

impl<'a, B: Backend, S: PositionScorer<B>> DecoderLoop<'a, B, S> {
    pub fn new(
        cell:         &'a DecoderCell<B>,
        start_scorer: &'a S,
        end_scorer:   &'a S,
        settings:     DecoderSettings,
    ) -> DcnResult<Self> {
        let h = settings.hidden_size;
        if cell.d_hidden() != h {
            return Err(DcnError::ShapeMismatch {
                what:     "decoder cell hidden size",
                expected: vec![h],
                got:      vec![cell.d_hidden()],
            });
        }
        if cell.d_input() != 4 * h {
            return Err(DcnError::ShapeMismatch {
                what:     "decoder cell input size",
                expected: vec![4 * h],
                got:      vec![cell.d_input()],
            });
        }
        Ok(Self { cell, start_scorer, end_scorer, settings })
    }

    /// Run all decoding steps over one batch.
    ///
    /// Every shape is checked before the first step; nothing is
    /// computed when the inputs disagree. NaN / Inf scores stop the
    /// run with `DcnError::NonFinite` before any index is selected.
    pub fn run(
        &self,
        encoding: Tensor<B, 3>,
        mask:     Option<Tensor<B, 2>>,
        labels:   Option<&SpanLabels<B>>,
    ) -> DcnResult<DecoderOutput<B>> {
        let [batch, doc_len, width] = encoding.dims();
        self.check_shapes([batch, doc_len, width], mask.as_ref(), labels)?;

        let device = encoding.device();
        let mut u_s = Tensor::<B, 2>::zeros([batch, width], &device);
        let mut u_e = Tensor::<B, 2>::zeros([batch, width], &device);
        let mut state: Option<RecurrentState<B>> = None;
        let mut total = LossAccumulator::new();
        let mut steps = Vec::with_capacity(self.settings.num_steps);

        for step in 0..self.settings.num_steps {
            let input = Tensor::cat(vec![u_s.clone(), u_e.clone()], 1);
            let (hidden, next_state) = self.cell.tick(input, state.take());
            state = Some(next_state);

            let alphas = self.guard(
                self.start_scorer.score(&encoding, &hidden, &u_s, &u_e),
                mask.as_ref(),
            );
            let betas = self.guard(
                self.end_scorer.score(&encoding, &hidden, &u_s, &u_e),
                mask.as_ref(),
            );
            check_scores("start logits", &alphas)?;
            check_scores("end logits", &betas)?;

            let start_index = first_argmax(alphas.clone());
            let end_index   = first_argmax(betas.clone());
            let next_start  = select_rows(&encoding, start_index.clone());
            let next_end    = select_rows(&encoding, end_index.clone());

            let loss = labels.map(|l| {
                span_cross_entropy(alphas.clone(), l.start.clone())
                    + span_cross_entropy(betas.clone(), l.end.clone())
            });
            if let Some(loss) = &loss {
                total.add(loss.clone());
            }

            tracing::trace!(
                step,
                start = ?index_values(start_index.clone()),
                end = ?index_values(end_index.clone()),
                "decoder step done"
            );

            steps.push(DecodingStep {
                step,
                prev_start: u_s,
                prev_end:   u_e,
                alphas,
                betas,
                start_index,
                end_index,
                u_s: next_start.clone(),
                u_e: next_end.clone(),
                loss,
            });

            u_s = next_start;
            u_e = next_end;
        }

        let (start_index, end_index) = steps
            .last()
            .map(|s| (s.start_index.clone(), s.end_index.clone()))
            .ok_or_else(|| DcnError::Config("decoder ran zero steps".into()))?;

        Ok(DecoderOutput { loss: total.total(), start_index, end_index, steps })
    }

    fn check_shapes(
        &self,
        dims:   [usize; 3],
        mask:   Option<&Tensor<B, 2>>,
        labels: Option<&SpanLabels<B>>,
    ) -> DcnResult<()> {
        let [batch, doc_len, width] = dims;
        if batch == 0 || doc_len == 0 {
            return Err(DcnError::ShapeMismatch {
                what:     "encoding (empty batch or document)",
                expected: vec![1, 1, 2 * self.settings.hidden_size],
                got:      dims.to_vec(),
            });
        }
        if width != 2 * self.settings.hidden_size {
            return Err(DcnError::ShapeMismatch {
                what:     "encoding width",
                expected: vec![batch, doc_len, 2 * self.settings.hidden_size],
                got:      dims.to_vec(),
            });
        }
        let expect_2d = |what: &'static str, t: &Tensor<B, 2>| {
            let got = t.dims();
            if got == [batch, doc_len] {
                Ok(())
            } else {
                Err(DcnError::ShapeMismatch {
                    what,
                    expected: vec![batch, doc_len],
                    got:      got.to_vec(),
                })
            }
        };
        if let Some(mask) = mask {
            expect_2d("document mask", mask)?;
        }
        if let Some(labels) = labels {
            expect_2d("start labels", &labels.start)?;
            expect_2d("end labels", &labels.end)?;
        }
        Ok(())
    }

    fn guard(&self, logits: Tensor<B, 2>, mask: Option<&Tensor<B, 2>>) -> Tensor<B, 2> {
        let clip = self.settings.logit_clip;
        let logits = if clip > 0.0 { logits.clamp(-clip, clip) } else { logits };
        match mask {
            Some(mask) => logits + mask.clone().sub_scalar(1.0).mul_scalar(MASK_PENALTY),
            None       => logits,
        }
    }
}

/// Fails on NaN / Inf anywhere in `scores`; masked padding (-1e9)
/// is finite.
fn check_scores<B: Backend>(what: &'static str, scores: &Tensor<B, 2>) -> DcnResult<()> {
    let total = scores.clone().sum().into_scalar().elem::<f64>();
    ensure_finite(what, total).map(|_| ())
}

// ─── Index helpers ────────────────────────────────────────────────────────────
/// Argmax over dim 1 that resolves ties to the lowest position.
///
/// [batch, L] → [batch]
pub fn first_argmax<B: Backend>(scores: Tensor<B, 2>) -> Tensor<B, 1, Int> {
    let [batch, len] = scores.dims();
    let device = scores.device();

    let best   = scores.clone().max_dim(1).expand([batch, len]);
    let is_max = scores.greater_equal(best);
    let positions = Tensor::<B, 1, Int>::arange(0..len as i64, &device)
        .float()
        .reshape([1, len])
        .expand([batch, len]);

    // Non-maximal positions are pushed past the end, then the
    // smallest remaining position wins.
    Tensor::<B, 2>::full([batch, len], len as f32, &device)
        .mask_where(is_max, positions)
        .min_dim(1)
        .int()
        .reshape([batch])
}

/// Gather one row of `encoding` per batch element.
///
/// encoding [batch, L, D], index [batch] → [batch, D]
pub fn select_rows<B: Backend>(encoding: &Tensor<B, 3>, index: Tensor<B, 1, Int>) -> Tensor<B, 2> {
    let [batch, len, width] = encoding.dims();
    let device = encoding.device();

    let one_hot = Tensor::<B, 1, Int>::arange(0..len as i64, &device)
        .reshape([1, len])
        .expand([batch, len])
        .equal(index.reshape([batch, 1]).expand([batch, len]))
        .float();

    one_hot
        .unsqueeze_dim::<3>(1)
        .matmul(encoding.clone())
        .reshape([batch, width])
}

/// Pull an index tensor back to the host
pub fn index_values<B: Backend>(index: Tensor<B, 1, Int>) -> Vec<usize> {
    index
        .into_data()
        .iter::<i64>()
        .map(|v| v.max(0) as usize)
        .collect()
}
