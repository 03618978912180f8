// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch to <run dir>/metrics.csv:
//
//   epoch,train_loss,val_loss,start_acc,end_acc,exact_match,f1,skipped_batches
//   1,9.124500,8.989200,0.123000,0.118000,0.041000,0.190000,0
//
// Losses are the cumulative decoder loss (summed over all
// decoding steps) averaged over batches, so they scale with
// num_decoding_steps.
//
// Also home to the span scores used by validation: exact match
// and token-overlap F1 between predicted and true word spans.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const HEADER: &str = "epoch,train_loss,val_loss,start_acc,end_acc,exact_match,f1,skipped_batches";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,

    /// Mean cumulative loss over training batches
    pub train_loss: f64,

    /// Mean cumulative loss over validation batches
    pub val_loss: f64,

    /// Fraction of final start pointers on the true start
    pub start_acc: f64,

    pub end_acc: f64,

    /// Fraction of predicted spans equal to the true span
    pub exact_match: f64,

    /// Mean word-overlap F1 of predicted vs true span
    pub f1: f64,

    /// Batches dropped for bad labels or a non-finite loss
    pub skipped_batches: usize,
}

// ─── Span scores ──────────────────────────────────────────────────────────────
/// Word-overlap F1 between two inclusive spans.
/// A predicted span with start > end is treated as empty.
pub fn span_f1(predicted: (usize, usize), truth: (usize, usize)) -> f64 {
    let (ps, pe) = predicted;
    let (ts, te) = truth;
    if ps > pe || ts > te {
        return 0.0;
    }
    let lo = ps.max(ts);
    let hi = pe.min(te);
    if lo > hi {
        return 0.0;
    }
    let overlap   = (hi - lo + 1) as f64;
    let precision = overlap / (pe - ps + 1) as f64;
    let recall    = overlap / (te - ts + 1) as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Running totals for start/end accuracy, exact match and F1
#[derive(Debug, Clone, Default)]
pub struct SpanScores {
    count:       usize,
    start_hits:  usize,
    end_hits:    usize,
    exact_hits:  usize,
    f1_sum:      f64,
}

impl SpanScores {
    pub fn add(&mut self, predicted: (usize, usize), truth: (usize, usize)) {
        self.count += 1;
        self.start_hits += usize::from(predicted.0 == truth.0);
        self.end_hits   += usize::from(predicted.1 == truth.1);
        self.exact_hits += usize::from(predicted == truth);
        self.f1_sum     += span_f1(predicted, truth);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    fn ratio(&self, hits: f64) -> f64 {
        if self.count == 0 { 0.0 } else { hits / self.count as f64 }
    }

    pub fn start_acc(&self) -> f64 { self.ratio(self.start_hits as f64) }
    pub fn end_acc(&self) -> f64 { self.ratio(self.end_hits as f64) }
    pub fn exact_match(&self) -> f64 { self.ratio(self.exact_hits as f64) }
    pub fn f1(&self) -> f64 { self.ratio(self.f1_sum) }
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so a
    /// restored run keeps appending to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{}",
            m.epoch,
            m.train_loss,
            m.val_loss,
            m.start_acc,
            m.end_acc,
            m.exact_match,
            m.f1,
            m.skipped_batches,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
