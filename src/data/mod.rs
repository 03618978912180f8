// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw question/context text to padded tensor
// batches:
//
//   SQuAD JSON                 generated corpus
//       │                            │
//       ▼                            │
//   tokenize   → words + char offsets│
//       │                            │
//       ▼                            │
//   glove      → word vectors        │
//       │                            │
//       ▼                            ▼
//   SquadSource               SyntheticSource     (QaSource)
//       └──────────────┬─────────────┘
//                      ▼
//   splitter    → seeded train / validation split
//                      │
//                      ▼
//   DcnDataset  → Burn Dataset
//                      │
//                      ▼
//   DcnBatcher  → padded tensors, masks, one-hot labels
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Word splitting with character offsets
pub mod tokenize;

/// GloVe text-format word vectors
pub mod glove;

/// SQuAD v1.1 reader
pub mod squad;

/// Seeded generated corpus
pub mod synthetic;

/// Dataset selection by name
pub mod source;

/// Implements Burn's Dataset trait for embedded samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
