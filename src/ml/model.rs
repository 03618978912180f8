use burn::prelude::*;

use crate::data::batcher::DcnBatch;
use crate::error::{DcnError, DcnResult};
use crate::ml::cell::{DecoderCell, DecoderCellConfig};
use crate::ml::decoder::{DecoderLoop, DecoderOutput, DecoderSettings};
use crate::ml::encoder::{CoattentionEncoder, CoattentionEncoderConfig, Encoder, EncoderInput};
use crate::ml::hmn::{HighwayMaxout, HighwayMaxoutConfig};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct DcnConfig {
    pub embedding_dim: usize,
    pub hidden_size:   usize,
    #[config(default = 16)]
    pub pool_size: usize,
    /// Applied to the document and question encodings only
    #[config(default = 0.3)]
    pub dropout: f64,
    #[config(default = 4)]
    pub num_decoding_steps: usize,
    #[config(default = 50.0)]
    pub logit_clip: f64,
}

impl DcnConfig {
    pub fn decoder_settings(&self) -> DcnResult<DecoderSettings> {
        DecoderSettings::new(self.num_decoding_steps, self.hidden_size, self.logit_clip)
    }

    /// Build the model. Decoder settings are validated first so a bad
    /// step count never allocates parameters.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DcnResult<DcnModel<B>> {
        let settings = self.decoder_settings()?;
        let h = self.hidden_size;
        let hmn = HighwayMaxoutConfig::new(h).with_pool_size(self.pool_size);

        Ok(DcnModel {
            encoder: CoattentionEncoderConfig::new(self.embedding_dim, h)
                .with_dropout(self.dropout)
                .init(device),
            decoder_cell:       DecoderCellConfig::new(4 * h, h).init(device),
            // Two separate inits: the pointers never share weights
            start_estimator:    hmn.init(device),
            end_estimator:      hmn.init(device),
            num_decoding_steps: settings.num_steps,
            hidden_size:        settings.hidden_size,
            logit_clip:         settings.logit_clip,
        })
    }
}

#[derive(Module, Debug)]
pub struct DcnModel<B: Backend> {
    pub encoder:         CoattentionEncoder<B>,
    pub decoder_cell:    DecoderCell<B>,
    pub start_estimator: HighwayMaxout<B>,
    pub end_estimator:   HighwayMaxout<B>,
    num_decoding_steps:  usize,
    hidden_size:         usize,
    logit_clip:          f64,
}

impl<B: Backend> DcnModel<B> {
    pub fn decoder(&self) -> DcnResult<DecoderLoop<'_, B, HighwayMaxout<B>>> {
        let settings = DecoderSettings::new(self.num_decoding_steps, self.hidden_size, self.logit_clip)?;
        DecoderLoop::new(&self.decoder_cell, &self.start_estimator, &self.end_estimator, settings)
    }

    /// Encode + decode with ground truth; the output carries the
    /// accumulated loss over every decoding step.
    pub fn forward(&self, batch: &DcnBatch<B>) -> DcnResult<DecoderOutput<B>> {
        let decoder  = self.decoder()?;
        let encoding = self.encoder.encode(&batch.encoder_input());
        decoder.run(encoding, Some(batch.document_mask.clone()), Some(&batch.labels()))
    }

    /// Cumulative loss tensor and its host value.
    /// A NaN / Inf loss comes back as `DcnError::NonFinite`.
    pub fn forward_loss(&self, batch: &DcnBatch<B>) -> DcnResult<(Tensor<B, 1>, f64)> {
        let output = self.forward(batch)?;
        match (output.checked_loss()?, output.loss) {
            (Some(value), Some(loss)) => Ok((loss, value)),
            _ => Err(DcnError::Config("labelled forward pass produced no loss".into())),
        }
    }

    /// Encode + decode without labels.
    pub fn predict(&self, input: &EncoderInput<B>) -> DcnResult<DecoderOutput<B>> {
        let decoder  = self.decoder()?;
        let encoding = self.encoder.encode(input);
        decoder.run(encoding, Some(input.document_mask.clone()), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::DcnBatcher;
    use crate::data::dataset::DcnSample;
    use crate::ml::hmn::PositionScorer;
    use crate::ml::loss::span_cross_entropy;
    use burn::backend::{Autodiff, NdArray};
    use burn::data::dataloader::batcher::Batcher;
    use burn::module::ParamId;
    use burn::optim::{AdamConfig, GradientsParams, Optimizer};
    use burn::tensor::Distribution;
    use std::collections::HashSet;

    type TestBackend = NdArray;
    type TrainBackend = Autodiff<NdArray>;

    fn tiny_config() -> DcnConfig {
        DcnConfig::new(6, 4).with_pool_size(2).with_num_decoding_steps(3)
    }

    fn samples() -> Vec<DcnSample> {
        vec![
            DcnSample {
                document:       (0..5 * 6).map(|v| (v as f32 * 0.37).sin()).collect(),
                question:       (0..2 * 6).map(|v| (v as f32 * 0.11).cos()).collect(),
                embedding_dim:  6,
                start_position: 1,
                end_position:   3,
            },
            DcnSample {
                document:       (0..3 * 6).map(|v| (v as f32 * 0.53).cos()).collect(),
                question:       (0..3 * 6).map(|v| (v as f32 * 0.29).sin()).collect(),
                embedding_dim:  6,
                start_position: 0,
                end_position:   2,
            },
        ]
    }

    fn hmn_param_ids<B: Backend>(h: &HighwayMaxout<B>) -> Vec<ParamId> {
        let mut ids = Vec::new();
        for linear in [&h.state_projection, &h.first_maxout, &h.second_maxout, &h.final_maxout] {
            ids.push(linear.weight.id.clone());
            if let Some(bias) = &linear.bias {
                ids.push(bias.id.clone());
            }
        }
        ids
    }

    fn fixed_input_scores<B: Backend>(h: &HighwayMaxout<B>, device: &B::Device) -> Vec<f32> {
        let encoding = Tensor::<B, 3>::ones([1, 3, 8], device);
        let hidden   = Tensor::<B, 2>::ones([1, 4], device).mul_scalar(0.5);
        let guess    = Tensor::<B, 2>::ones([1, 8], device).mul_scalar(-0.25);
        h.score(&encoding, &hidden, &guess, &guess).into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_zero_decoding_steps_rejected_at_init() {
        let err = tiny_config()
            .with_num_decoding_steps(0)
            .init::<TestBackend>(&Default::default())
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_forward_on_padded_batch() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device).unwrap();
        let batch = DcnBatcher::<TestBackend>::new(device.clone()).batch(samples(), &device);

        let out = model.forward(&batch).unwrap();
        assert_eq!(out.steps.len(), 3);
        assert_eq!(out.steps[0].alphas.dims(), [2, 5]);
        let loss = out.checked_loss().unwrap().unwrap();
        assert!(loss > 0.0);

        // The second document has 3 real words out of 5 positions
        let (s, e) = out.spans()[1];
        assert!(s < 3 && e < 3);
    }

    #[test]
    fn test_forward_loss_matches_step_sum() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device).unwrap();
        let batch = DcnBatcher::<TestBackend>::new(device.clone()).batch(samples(), &device);

        let (_, value) = model.forward_loss(&batch).unwrap();
        let steps: f64 = model
            .forward(&batch)
            .unwrap()
            .steps
            .iter()
            .map(|s| s.loss.clone().unwrap().into_scalar().elem::<f64>())
            .sum();
        assert!((value - steps).abs() < 1e-4);
    }

    #[test]
    fn test_predict_has_no_loss() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device).unwrap();
        let batch = DcnBatcher::<TestBackend>::new(device.clone()).batch(samples(), &device);
        let out = model.predict(&batch.encoder_input()).unwrap();
        assert!(out.loss.is_none());
        assert_eq!(out.spans().len(), 2);
    }

    #[test]
    fn test_start_and_end_estimators_own_disjoint_parameters() {
        let model = tiny_config().init::<TestBackend>(&Default::default()).unwrap();
        let start: HashSet<_> = hmn_param_ids(&model.start_estimator).into_iter().collect();
        let end:   HashSet<_> = hmn_param_ids(&model.end_estimator).into_iter().collect();
        assert_eq!(start.len(), 7);
        assert!(start.is_disjoint(&end));
    }

    #[test]
    fn test_start_only_update_leaves_end_estimator_untouched() {
        let device = Default::default();
        let model = tiny_config().init::<TrainBackend>(&device).unwrap();

        let start_before = fixed_input_scores(&model.start_estimator, &device);
        let end_before   = fixed_input_scores(&model.end_estimator, &device);

        let loss = {
            let decoder  = model.decoder().unwrap();
            let encoding = Tensor::<TrainBackend, 3>::random([2, 5, 8], Distribution::Normal(0.0, 1.0), &device);
            let batch    = DcnBatcher::<TrainBackend>::new(device.clone()).batch(samples(), &device);
            let out = decoder.run(encoding, None, Some(&batch.labels())).unwrap();
            out.steps
                .iter()
                .map(|s| span_cross_entropy(s.alphas.clone(), batch.start_labels.clone()))
                .reduce(|a, b| a + b)
                .unwrap()
        };

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        let mut optim = AdamConfig::new().init();
        let model = optim.step(1e-2, model, grads);

        assert_ne!(fixed_input_scores(&model.start_estimator, &device), start_before);
        assert_eq!(fixed_input_scores(&model.end_estimator, &device), end_before);
    }
}
