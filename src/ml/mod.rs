// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All network code lives here:
//
//   encoder.rs    — coattention encoder, documents + questions
//                   → fused encoding U [batch, m, 2H]
//   hmn.rs        — Highway Maxout Network position scorer
//   cell.rs       — single-tick LSTM used by the decoder
//   loss.rs       — soft-label cross-entropy, accumulation,
//                   non-finite guard
//   decoder.rs    — the iterative answer-pointer loop
//   model.rs      — DcnModel wiring the pieces together
//   trainer.rs    — epoch loop, validation, checkpointing
//   inferencer.rs — single question answering from a checkpoint
//
// Reference: Xiong, Zhong & Socher (2017) Dynamic Coattention
//            Networks for Question Answering

/// Coattention document/question encoder
pub mod encoder;

/// Highway Maxout Network scorer
pub mod hmn;

/// Recurrent cell adapter
pub mod cell;

/// Loss accumulation across decoding steps
pub mod loss;

/// Iterative answer-pointer decoder
pub mod decoder;

/// Full DCN model
pub mod model;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Inference engine — loads checkpoint and predicts answers
pub mod inferencer;
