// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by training and prediction:
//
//   checkpoint.rs — Saving and loading every DCN parameter as
//                   one record (CompactRecorder), plus the
//                   TrainConfig JSON needed to rebuild the model.
//                   Keyed by run identifier.
//
//   metrics.rs    — Per-epoch CSV log and the span scores
//                   (accuracy, exact match, F1) behind it.
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
