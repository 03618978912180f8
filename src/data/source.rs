use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::DcnError;

/// Which QaSource feeds training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetKind {
    #[serde(rename = "SQuAD")]
    Squad,
    #[serde(rename = "synthetic")]
    Synthetic,
}

impl FromStr for DatasetKind {
    type Err = DcnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "squad"     => Ok(DatasetKind::Squad),
            "synthetic" => Ok(DatasetKind::Synthetic),
            _           => Err(DcnError::UnsupportedDataset(s.to_string())),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::Squad     => write!(f, "SQuAD"),
            DatasetKind::Synthetic => write!(f, "synthetic"),
        }
    }
}
