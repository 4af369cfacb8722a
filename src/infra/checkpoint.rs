// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved per training run:
//   1. Model weights ({name}_best.mpk.gz) — parameters of the
//      epoch with the best validation loss so far
//   2. hyperparams.json — the fully resolved configuration
//
// Why save the hyperparameters separately?
//   When loading for evaluation, we need the exact model
//   architecture (projection dim, layer count, active
//   modalities, ...) to rebuild the model before the weights
//   can be loaded into it. The resolved configuration also
//   pins the dataset, so evaluation reads the matching test
//   split without re-deriving anything.
//
// Burn's CompactRecorder:
//   - Serialises model parameters to MessagePack format
//   - Compresses with gzip for smaller file size
//   - Type-safe: loading fails if architecture doesn't match
//
// File naming convention:
//   checkpoints/
//     mult_best.mpk.gz   ← best weights of trial "mult"
//     hyperparams.json   ← resolved run configuration
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use std::{fs, path::PathBuf};

use crate::application::hyperparams::HyperParams;
use crate::ml::model::MultModel;

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    /// Path to the directory where checkpoints are stored
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager.
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        // create_dir_all creates parent directories too, like `mkdir -p`
        // .ok() ignores the error if the directory already exists
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    /// Checkpoint file stem for a trial name (the recorder
    /// appends its own .mpk.gz extension).
    fn best_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}_best"))
    }

    /// Save the current model weights as the best checkpoint
    /// of this trial, overwriting the previous best.
    pub fn save_best<B: AutodiffBackend>(&self, model: &MultModel<B>, name: &str) -> Result<()> {
        let path = self.best_path(name);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved best checkpoint for trial '{name}'");
        Ok(())
    }

    /// Load the best weights of a trial into a freshly built
    /// model of the same architecture.
    ///
    /// load_record() returns a new model with the loaded
    /// weights, so the passed-in model is consumed.
    pub fn load_best<B: Backend>(
        &self,
        model:  MultModel<B>,
        name:   &str,
        device: &B::Device,
    ) -> Result<MultModel<B>> {
        let path = self.best_path(name);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "cannot load checkpoint '{}'. Have you trained trial '{}' first?",
                    path.display(),
                    name
                )
            })?;

        Ok(model.load_record(record))
    }

    /// Save the resolved hyperparameters to JSON.
    ///
    /// Called once, before training starts, so evaluation can
    /// reconstruct the exact model architecture later.
    pub fn save_hyperparams(&self, hyp: &HyperParams) -> Result<()> {
        let path = self.dir.join("hyperparams.json");

        // serde_json::to_string_pretty adds indentation for readability
        let json = serde_json::to_string_pretty(hyp)?;

        fs::write(&path, json)
            .with_context(|| format!("cannot write hyperparameters to '{}'", path.display()))?;

        tracing::debug!("Saved resolved hyperparameters to '{}'", path.display());
        Ok(())
    }

    /// Load the resolved hyperparameters back from JSON.
    ///
    /// Called by the evaluation use case to know what model
    /// architecture was trained so it can rebuild the same one.
    pub fn load_hyperparams(&self) -> Result<HyperParams> {
        let path = self.dir.join("hyperparams.json");

        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "cannot read hyperparameters from '{}'. \
                 Make sure you have run 'train' before 'evaluate'.",
                path.display()
            )
        })?;

        Ok(serde_json::from_str(&json)?)
    }
}
