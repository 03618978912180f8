// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: these use cases tell the data,
// ml and infra layers what to do, in which order.
//
//   - No tensor math here
//   - No printing here (that's Layer 1)

// The training / evaluation workflow
pub mod train_use_case;

// Answering a question with a trained run
pub mod predict_use_case;
