// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop over Burn's DataLoader with Adam.
//
// Per training batch:
//   1. batch.validate()  — bad labels → warn, skip the batch
//   2. model.forward     — encoder once, then every decoding step
//   3. numeric check     — NaN / Inf logits or loss → warn, skip the update
//   4. backward + Adam step on all parameters at once
//
// Validation runs on model.valid() (inner backend, dropout off)
// and reports the cumulative loss, start/end accuracy, exact
// match and span F1 of the final decoding step.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{DcnBatch, DcnBatcher},
    dataset::DcnDataset,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger, SpanScores},
};
use crate::ml::model::DcnModel;

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: DcnDataset,
    val_dataset:   DcnDataset,
    ckpt_manager:  CheckpointManager,
) -> Result<Vec<EpochMetrics>> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop::<TrainBackend>(cfg, train_dataset, val_dataset, &ckpt_manager, device)
}

/// Loss and span scores over one pass of a data loader
#[derive(Debug, Default)]
pub struct Evaluation {
    pub loss:    f64,
    pub scores:  SpanScores,
    pub skipped: usize,
}

/// Score `model` on every batch without updating it.
pub fn evaluate<B: Backend>(
    model:   &DcnModel<B>,
    batches: impl Iterator<Item = DcnBatch<B>>,
) -> Result<Evaluation> {
    let mut eval     = Evaluation::default();
    let mut loss_sum = 0.0f64;
    let mut counted  = 0usize;

    for batch in batches {
        if let Err(err) = batch.validate() {
            tracing::warn!("Skipping validation batch: {err}");
            eval.skipped += 1;
            continue;
        }
        let output = match model.forward(&batch) {
            Ok(output) => output,
            Err(err) if err.is_numeric() => {
                tracing::warn!("Skipping validation batch: {err}");
                eval.skipped += 1;
                continue;
            }
            Err(err) => return Err(err).context("Validation forward pass failed"),
        };
        match output.checked_loss() {
            Ok(Some(value)) => {
                loss_sum += value;
                counted  += 1;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!("Skipping validation batch: {err}");
                eval.skipped += 1;
                continue;
            }
        }
        for (predicted, truth) in output.spans().into_iter().zip(&batch.spans) {
            eval.scores.add(predicted, *truth);
        }
    }

    eval.loss = if counted > 0 { loss_sum / counted as f64 } else { f64::NAN };
    Ok(eval)
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: DcnDataset,
    val_dataset:   DcnDataset,
    ckpt_manager:  &CheckpointManager,
    device:        B::Device,
) -> Result<Vec<EpochMetrics>> {
    B::seed(&device, cfg.seed);

    // ── Build / restore model ─────────────────────────────────────────────────
    let model_cfg = cfg.model_config();
    let mut model: DcnModel<B> = model_cfg.init(&device)?;
    let mut first_epoch = 1;

    if cfg.test || (cfg.restore && ckpt_manager.has_checkpoint()) {
        let (restored, epoch) = ckpt_manager.load_model(model, &device)?;
        model       = restored;
        first_epoch = epoch + 1;
    } else if cfg.restore {
        tracing::warn!("--restore given but no checkpoint in '{}'; starting fresh", ckpt_manager.dir().display());
    }
    tracing::info!(
        "Model ready: hidden={}, pool={}, decoding steps={}",
        cfg.hidden_state_size, cfg.pool_size, cfg.num_decoding_steps
    );

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let val_batcher = DcnBatcher::<B::InnerBackend>::new(device.clone());
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    let metrics_logger = MetricsLogger::new(ckpt_manager.dir())?;

    if cfg.test {
        let eval = evaluate(&model.valid(), val_loader.iter())?;
        let m = EpochMetrics {
            epoch:           first_epoch - 1,
            train_loss:      f64::NAN,
            val_loss:        eval.loss,
            start_acc:       eval.scores.start_acc(),
            end_acc:         eval.scores.end_acc(),
            exact_match:     eval.scores.exact_match(),
            f1:              eval.scores.f1(),
            skipped_batches: eval.skipped,
        };
        println!(
            "Test | loss={:.4} | start_acc={:.1}% | end_acc={:.1}% | EM={:.1}% | F1={:.1}%",
            m.val_loss, m.start_acc * 100.0, m.end_acc * 100.0,
            m.exact_match * 100.0, m.f1 * 100.0,
        );
        return Ok(vec![m]);
    }

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_batcher = DcnBatcher::<B>::new(device.clone());
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    let mut history = Vec::new();

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in first_epoch..=cfg.num_epochs {
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;
        let mut skipped        = 0usize;

        for (index, batch) in train_loader.iter().enumerate() {
            if let Err(err) = batch.validate() {
                tracing::warn!("Epoch {epoch}, batch {index}: {err}; skipping");
                skipped += 1;
                continue;
            }

            let (loss, loss_val) = match model.forward_loss(&batch) {
                Ok(pair) => pair,
                Err(err) if err.is_numeric() => {
                    tracing::warn!("Epoch {epoch}, batch {index}: {err}; optimizer step skipped");
                    skipped += 1;
                    continue;
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("Forward pass failed in epoch {epoch}, batch {index}"))
                }
            };

            train_loss_sum += loss_val;
            train_batches  += 1;
            tracing::trace!("epoch {epoch} batch {index} loss {loss_val:.4}");

            // Backward pass + Adam update over encoder, cell and both HMNs
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        let eval = evaluate(&model.valid(), val_loader.iter())?;

        let m = EpochMetrics {
            epoch,
            train_loss:      avg_train_loss,
            val_loss:        eval.loss,
            start_acc:       eval.scores.start_acc(),
            end_acc:         eval.scores.end_acc(),
            exact_match:     eval.scores.exact_match(),
            f1:              eval.scores.f1(),
            skipped_batches: skipped + eval.skipped,
        };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | start_acc={:.1}% | end_acc={:.1}% | EM={:.1}% | F1={:.1}%",
            epoch, cfg.num_epochs, m.train_loss, m.val_loss,
            m.start_acc * 100.0, m.end_acc * 100.0, m.exact_match * 100.0, m.f1 * 100.0,
        );
        if m.skipped_batches > 0 {
            tracing::warn!("Epoch {} skipped {} batches", epoch, m.skipped_batches);
        }

        metrics_logger.log(&m)?;
        ckpt_manager.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
        history.push(m);
    }

    tracing::info!("Training complete!");
    Ok(history)
}
