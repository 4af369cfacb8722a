// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Why log metrics to CSV?
//   - Easy to open in Excel or Google Sheets
//   - Can plot learning curves to diagnose training issues
//   - Provides a permanent record of each training run
//   - Makes runs with different labeled ratios comparable
//
// Metrics recorded per epoch:
//   - epoch:         the epoch number (1, 2, 3, ...)
//   - train_loss:    average combined loss on the training set
//                    (supervised part + weighted pseudo-label part)
//   - valid_loss:    average supervised loss on the validation set
//   - lr:            learning rate used for this epoch (changes
//                    when validation loss plateaus)
//   - pseudo_labels: number of unlabeled samples that currently
//                    hold an admitted pseudo-label
//
// Output file: checkpoints/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,valid_loss,lr,pseudo_labels
//   1,0.912400,0.874100,0.001000,0
//   2,0.853100,0.841700,0.001000,118
//   ...
//
// How to read the metrics:
//   - Loss should decrease each epoch (model is learning)
//   - If valid_loss increases while train_loss decreases → overfitting
//   - pseudo_labels should grow as the model gets confident
//   - A drop in lr means validation loss plateaued for `when` epochs
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Average combined loss over all training batches.
    /// Includes the pseudo-label term, so it is not directly
    /// comparable to valid_loss when lambda_u > 0.
    pub train_loss: f64,

    /// Average supervised loss on the validation set.
    /// This is the value the plateau scheduler and the
    /// best-checkpoint decision are based on.
    pub valid_loss: f64,

    /// Learning rate in effect during this epoch
    pub lr: f64,

    /// How many unlabeled training samples currently carry an
    /// admitted pseudo-label (0 until the model is confident)
    pub pseudo_labels: usize,
}

impl EpochMetrics {
    /// Create a new EpochMetrics record
    pub fn new(
        epoch:         usize,
        train_loss:    f64,
        valid_loss:    f64,
        lr:            f64,
        pseudo_labels: usize,
    ) -> Self {
        Self { epoch, train_loss, valid_loss, lr, pseudo_labels }
    }

    /// Returns true if this epoch improved over the previous best valid_loss
    pub fn is_improvement(&self, best_valid_loss: f64) -> bool {
        self.valid_loss < best_valid_loss
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    /// Full path to the CSV file
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());

        // Create directory if it doesn't exist
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");

        // Write CSV header only if file is new
        // This allows appending to an existing log across runs
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            // Write the header row
            writeln!(f, "epoch,train_loss,valid_loss,lr,pseudo_labels")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    ///
    /// Uses OpenOptions with append=true so we add to the file
    /// without overwriting previous epochs.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        // Open in append mode — adds to end of file
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        // Write one CSV row with 6 decimal places for each loss
        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{}",
            m.epoch,
            m.train_loss,
            m.valid_loss,
            m.lr,
            m.pseudo_labels,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, valid_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.valid_loss,
        );

        Ok(())
    }

    /// Return the path to the metrics CSV file
    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 0.85, 0.83, 1e-3, 40);
        // 0.83 < 0.90 → this is an improvement
        assert!(m.is_improvement(0.90));
        // 0.83 is NOT less than 0.80 → not an improvement
        assert!(!m.is_improvement(0.80));
    }
}
