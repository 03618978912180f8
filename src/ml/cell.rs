// ============================================================
// Layer 5 — Recurrent Cell Adapter
// ============================================================
// Single-layer LSTM driven one tick at a time.
//
// The decoder input at tick t is built from the pointers chosen
// at tick t-1, so the recurrence cannot be unrolled over a
// sequence up front. Each tick feeds a length-1 sequence into
// burn's Lstm and hands the returned state back on the next call.
//
// Convention for "h": the HMN receives the LSTM hidden output
// h_t only ([batch, hidden]). The cell memory c_t travels inside
// the carried LstmState and is never exposed to the scorers.

use burn::{
    nn::{Lstm, LstmConfig, LstmState},
    prelude::*,
};

/// Opaque recurrent state carried between ticks (hidden + cell memory)
pub type RecurrentState<B> = LstmState<B, 2>;

#[derive(Config, Debug)]
pub struct DecoderCellConfig {
    /// Size of one tick's input (u_s ; u_e = 4 × hidden)
    pub d_input:  usize,
    pub d_hidden: usize,
}

impl DecoderCellConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DecoderCell<B> {
        DecoderCell {
            lstm:     LstmConfig::new(self.d_input, self.d_hidden, true).init(device),
            d_input:  self.d_input,
            d_hidden: self.d_hidden,
        }
    }
}

#[derive(Module, Debug)]
pub struct DecoderCell<B: Backend> {
    pub lstm: Lstm<B>,
    d_input:  usize,
    d_hidden: usize,
}

impl<B: Backend> DecoderCell<B> {
    /// Advance one tick.
    ///
    /// input: [batch, d_input], state: None → zero state
    /// returns (h_t [batch, d_hidden], new state)
    pub fn tick(
        &self,
        input: Tensor<B, 2>,
        state: Option<RecurrentState<B>>,
    ) -> (Tensor<B, 2>, RecurrentState<B>) {
        let [batch, d_input] = input.dims();
        let (output, state) = self.lstm.forward(input.reshape([batch, 1, d_input]), state);
        (output.reshape([batch, self.d_hidden]), state)
    }

    pub fn d_input(&self) -> usize {
        self.d_input
    }

    pub fn d_hidden(&self) -> usize {
        self.d_hidden
    }
}
