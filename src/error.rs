// ============================================================
// Typed errors for the DCN core
// ============================================================
// The ML layers return DcnError so callers can tell the three
// failure families apart:
//
//   configuration errors — bad settings or tensor shapes,
//                          reported before any computation
//   data errors          — malformed or out-of-range labels,
//                          fatal for the offending batch only
//   numeric instability  — NaN/Inf in a loss or logits
//
// The application and CLI layers wrap these in anyhow.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DcnError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("shape mismatch for {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what:     &'static str,
        expected: Vec<usize>,
        got:      Vec<usize>,
    },

    #[error("unsupported dataset '{0}' (expected one of: SQuAD, synthetic)")]
    UnsupportedDataset(String),

    #[error("invalid label in sample {sample}: {reason}")]
    InvalidLabel { sample: usize, reason: String },

    #[error("data error: {0}")]
    Data(String),

    #[error("non-finite {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },
}

impl DcnError {
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            DcnError::Config(_) | DcnError::ShapeMismatch { .. } | DcnError::UnsupportedDataset(_)
        )
    }

    pub fn is_data(&self) -> bool {
        matches!(self, DcnError::InvalidLabel { .. } | DcnError::Data(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DcnError::NonFinite { .. })
    }
}

pub type DcnResult<T> = std::result::Result<T, DcnError>;
