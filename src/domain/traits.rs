// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training pipeline only sees QaSource; where the examples
// come from (a SQuAD file + GloVe vectors, a generated corpus)
// is decided by the implementation.
//
//   - SquadSource     → SQuAD v1.1 JSON embedded with GloVe
//   - SyntheticSource → seeded generated corpus

use anyhow::Result;

use crate::data::dataset::DcnSample;

// ─── QaSource ─────────────────────────────────────────────────────────────────
/// Anything that yields embedded examples with span labels.
pub trait QaSource {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Document vectors, question vectors and (start, end) word
    /// indices for every usable example.
    fn get_data(&self) -> Result<Vec<DcnSample>>;
}
