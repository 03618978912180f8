// ============================================================
// Layer 5 — Highway Maxout Network
// ============================================================
// Scores every document position as a candidate start (or end)
// of the answer, conditioned on the decoder hidden state and the
// current start/end guesses.
//
//   r     = tanh(W_D [h ; u_s ; u_e])               [batch, H]
//   m1_t  = max_p(W_1 [U_t ; r] + b_1)              [batch, L, H]
//   m2_t  = max_p(W_2 m1_t + b_2)                   [batch, L, H]
//   score = max_p(W_3 [m1_t ; m2_t] + b_3)          [batch, L]
//
// max_p is a maxout over groups of `pool_size` consecutive units.
// The highway connection is the m1 term fed straight into W_3.
//
// Reference: Xiong, Zhong & Socher (2017) Dynamic Coattention Networks

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::tanh,
};

// ─── PositionScorer ───────────────────────────────────────────────────────────
/// Anything that turns (encoding, decoder state, previous guesses)
/// into one logit per document position.
pub trait PositionScorer<B: Backend> {
    /// encoding:   [batch, L, 2H]
    /// hidden:     [batch, H]
    /// prev_start: [batch, 2H]
    /// prev_end:   [batch, 2H]
    /// returns     [batch, L]
    fn score(
        &self,
        encoding:   &Tensor<B, 3>,
        hidden:     &Tensor<B, 2>,
        prev_start: &Tensor<B, 2>,
        prev_end:   &Tensor<B, 2>,
    ) -> Tensor<B, 2>;
}

#[derive(Config, Debug)]
pub struct HighwayMaxoutConfig {
    /// Decoder hidden size H (encoding rows are 2H wide)
    pub hidden_size: usize,
    #[config(default = 16)]
    pub pool_size: usize,
}

impl HighwayMaxoutConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> HighwayMaxout<B> {
        let h = self.hidden_size;
        let p = self.pool_size;
        HighwayMaxout {
            state_projection: LinearConfig::new(5 * h, h).with_bias(false).init(device),
            first_maxout:     LinearConfig::new(3 * h, p * h).init(device),
            second_maxout:    LinearConfig::new(h, p * h).init(device),
            final_maxout:     LinearConfig::new(2 * h, p).init(device),
            hidden_size:      h,
            pool_size:        p,
        }
    }
}

#[derive(Module, Debug)]
pub struct HighwayMaxout<B: Backend> {
    pub state_projection: Linear<B>,
    pub first_maxout:     Linear<B>,
    pub second_maxout:    Linear<B>,
    pub final_maxout:     Linear<B>,
    hidden_size:          usize,
    pool_size:            usize,
}

impl<B: Backend> PositionScorer<B> for HighwayMaxout<B> {
    fn score(
        &self,
        encoding:   &Tensor<B, 3>,
        hidden:     &Tensor<B, 2>,
        prev_start: &Tensor<B, 2>,
        prev_end:   &Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let [batch, doc_len, _] = encoding.dims();
        let h = self.hidden_size;

        let r = tanh(self.state_projection.forward(Tensor::cat(
            vec![hidden.clone(), prev_start.clone(), prev_end.clone()],
            1,
        )));
        // Same r for every position of the document
        let r = r.unsqueeze_dim::<3>(1).expand([batch, doc_len, h]);

        let m1 = maxout(
            self.first_maxout.forward(Tensor::cat(vec![encoding.clone(), r], 2)),
            self.pool_size,
        );
        let m2 = maxout(self.second_maxout.forward(m1.clone()), self.pool_size);
        let scores = maxout(
            self.final_maxout.forward(Tensor::cat(vec![m1, m2], 2)),
            self.pool_size,
        );

        scores.reshape([batch, doc_len])
    }
}

/// Max over consecutive groups of `pool` units on the last axis.
///
/// [batch, L, k·pool] → [batch, L, k]
pub fn maxout<B: Backend>(x: Tensor<B, 3>, pool: usize) -> Tensor<B, 3> {
    let [batch, len, units] = x.dims();
    let groups = units / pool;
    x.reshape([batch, len, groups, pool])
        .max_dim(3)
        .reshape([batch, len, groups])
}
