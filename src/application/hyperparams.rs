// ============================================================
// Layer 2 — Hyperparameter Resolution
// ============================================================
// Merges what the user asked for (CLI options) with what the
// data actually looks like (feature dims, sequence lengths,
// split sizes) into ONE immutable configuration value.
//
// Why a single resolve step instead of filling fields as we go?
//   The original recipe for bugs is a config object that is
//   half-initialised for most of the program's lifetime.
//   HyperParams has exactly one constructor, runs after the
//   three splits are loaded, and is never mutated afterwards —
//   every consumer (trainer, checkpointing, evaluation) sees
//   the same finished value.
//
// The resolver also cross-checks the dataset tables against
// the labels that were actually loaded: an iemocap-style
// cross-entropy head must be twice as wide as the label vector
// (two logits per class), and a regression head must match it
// exactly. Catching that here turns a confusing shape panic
// deep inside the loss into a one-line startup error.
//
// The resolved value is saved as hyperparams.json next to the
// checkpoints, so `evaluate` can rebuild the identical model.
//
// Reference: Rust Book §5 (Structs), Rust Book §9 (Errors)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainOptions;
use crate::data::dataset::MultimodalDataset;
use crate::domain::dataset_kind::{Criterion, DatasetKind};
use crate::domain::modality::ModalitySelection;
use crate::domain::model_kind::{ModelKind, OptimKind};
use crate::ml::model::MultConfig;

/// The fully resolved configuration of one training run.
/// CLI-derived fields first, data-derived fields at the end;
/// the data-derived fields are set exactly once by `resolve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperParams {
    // ── Identity ──
    pub model:   ModelKind,
    pub dataset: DatasetKind,
    /// Trial name; keys the checkpoint files
    pub name:    String,
    pub aligned: bool,

    // ── Modalities ──
    pub modalities: ModalitySelection,

    // ── Architecture ──
    /// Layers per crossmodal stack (--nlevels)
    pub layers:         usize,
    pub num_heads:      usize,
    pub attn_mask:      bool,
    pub attn_dropout:   f64,
    pub attn_dropout_a: f64,
    pub attn_dropout_v: f64,
    pub relu_dropout:   f64,
    pub embed_dropout:  f64,
    pub res_dropout:    f64,
    pub out_dropout:    f64,

    // ── Optimisation ──
    pub optim:        OptimKind,
    pub batch_size:   usize,
    /// L2-norm gradient clipping threshold
    pub clip:         f64,
    pub lr:           f64,
    pub num_epochs:   usize,
    /// Plateau patience: epochs without improvement before lr decays
    pub when:         usize,
    pub log_interval: usize,
    pub seed:         u64,

    // ── Semi-supervised ──
    pub labeled_ratio:               f64,
    pub pseudolabel_threshold:       f64,
    pub pseudolabel_update_interval: usize,
    pub lambda_u:                    f64,

    // ── Paths ──
    pub data_path:      String,
    pub checkpoint_dir: String,

    // ── Data-derived (set exactly once, after loading) ──
    /// Raw feature widths ("l" is the historical shorthand for language)
    pub orig_d_l: usize,
    pub orig_d_a: usize,
    pub orig_d_v: usize,
    /// Per-modality sequence lengths
    pub l_len: usize,
    pub a_len: usize,
    pub v_len: usize,
    /// Split sizes
    pub n_train: usize,
    pub n_valid: usize,
    pub n_test:  usize,
    /// Ground-truth label vector length
    pub label_dim:  usize,
    /// Model head width (from the dataset table)
    pub output_dim: usize,
    pub criterion:  Criterion,
}

impl HyperParams {
    /// Build the one configuration value of this run.
    ///
    /// The caller has already validated the modality flags and
    /// parsed the model/optimiser/dataset names (both happen
    /// before any data is loaded); this step folds in what the
    /// loaded splits report about themselves.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        opts:       &TrainOptions,
        model:      ModelKind,
        optim:      OptimKind,
        dataset:    DatasetKind,
        modalities: ModalitySelection,
        train: &MultimodalDataset,
        valid: &MultimodalDataset,
        test:  &MultimodalDataset,
    ) -> Result<Self> {
        let (orig_d_l, orig_d_a, orig_d_v) = train.feature_dims();
        let (l_len, a_len, v_len) = train.seq_lens();
        let label_dim  = train.label_dim();
        let output_dim = dataset.output_dim();
        let criterion  = dataset.criterion();

        // The head must be expressible against the labels we
        // actually loaded — fail now, not inside the loss.
        match criterion {
            Criterion::CrossEntropy => {
                if output_dim != 2 * label_dim {
                    bail!(
                        "dataset '{}' trains {} paired logits but its labels \
                         carry {} classes (expected {})",
                        dataset.name(),
                        output_dim,
                        label_dim,
                        output_dim / 2,
                    );
                }
            }
            Criterion::L1 => {
                if output_dim != label_dim {
                    bail!(
                        "dataset '{}' regresses {} values but its labels \
                         carry {}",
                        dataset.name(),
                        output_dim,
                        label_dim,
                    );
                }
            }
        }

        Ok(Self {
            model,
            dataset,
            name:    opts.name.clone(),
            aligned: opts.aligned,
            modalities,

            layers:         opts.nlevels,
            num_heads:      opts.num_heads,
            attn_mask:      opts.attn_mask,
            attn_dropout:   opts.attn_dropout,
            attn_dropout_a: opts.attn_dropout_a,
            attn_dropout_v: opts.attn_dropout_v,
            relu_dropout:   opts.relu_dropout,
            embed_dropout:  opts.embed_dropout,
            res_dropout:    opts.res_dropout,
            out_dropout:    opts.out_dropout,

            optim,
            batch_size:   opts.batch_size,
            clip:         opts.clip,
            lr:           opts.lr,
            num_epochs:   opts.num_epochs,
            when:         opts.when,
            log_interval: opts.log_interval,
            seed:         opts.seed,

            labeled_ratio:               opts.labeled_ratio,
            pseudolabel_threshold:       opts.pseudolabel_threshold,
            pseudolabel_update_interval: opts.pseudolabel_update_interval,
            lambda_u:                    opts.lambda_u,

            data_path:      opts.data_path.clone(),
            checkpoint_dir: opts.checkpoint_dir.clone(),

            orig_d_l, orig_d_a, orig_d_v,
            l_len, a_len, v_len,
            n_train: train.sample_count(),
            n_valid: valid.sample_count(),
            n_test:  test.sample_count(),
            label_dim,
            output_dim,
            criterion,
        })
    }

    /// The model architecture this configuration describes.
    /// Used by the trainer AND by `evaluate`, so both always
    /// build the same graph for the same hyperparams.json.
    pub fn model_config(&self) -> MultConfig {
        MultConfig::new(
            self.orig_d_l,
            self.orig_d_a,
            self.orig_d_v,
            self.l_len,
            self.a_len,
            self.v_len,
            self.modalities.text,
            self.modalities.audio,
            self.modalities.vision,
            self.output_dim,
        )
        .with_num_heads(self.num_heads)
        .with_layers(self.layers)
        .with_attn_mask(self.attn_mask)
        .with_attn_dropout(self.attn_dropout)
        .with_attn_dropout_a(self.attn_dropout_a)
        .with_attn_dropout_v(self.attn_dropout_v)
        .with_relu_dropout(self.relu_dropout)
        .with_embed_dropout(self.embed_dropout)
        .with_res_dropout(self.res_dropout)
        .with_out_dropout(self.out_dropout)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::{MultimodalSample, SegmentMeta};

    fn split(n: usize, label_dim: usize) -> MultimodalDataset {
        let samples = (0..n)
            .map(|index| MultimodalSample {
                index,
                text:    vec![vec![0.0; 3]; 4],
                audio:   vec![vec![0.0; 2]; 5],
                vision:  vec![vec![0.0; 6]; 2],
                label:   vec![0.0; label_dim],
                meta:    SegmentMeta::new(format!("seg[{index}]"), 0.0, 1.0),
                labeled: true,
            })
            .collect();
        MultimodalDataset::new(samples)
    }

    fn resolve_for(dataset: &str, label_dim: usize) -> Result<HyperParams> {
        let opts = TrainOptions {
            dataset: dataset.to_string(),
            ..TrainOptions::default()
        };
        HyperParams::resolve(
            &opts,
            ModelKind::Mult,
            OptimKind::Adam,
            DatasetKind::parse(dataset),
            ModalitySelection::from_flags(false, false, false).unwrap(),
            &split(6, label_dim),
            &split(2, label_dim),
            &split(2, label_dim),
        )
    }

    #[test]
    fn test_resolve_copies_data_derived_fields() {
        let hyp = resolve_for("mosei_senti", 1).unwrap();
        assert_eq!((hyp.orig_d_l, hyp.orig_d_a, hyp.orig_d_v), (3, 2, 6));
        assert_eq!((hyp.l_len, hyp.a_len, hyp.v_len), (4, 5, 2));
        assert_eq!((hyp.n_train, hyp.n_valid, hyp.n_test), (6, 2, 2));
        assert_eq!(hyp.output_dim, 1);
        assert_eq!(hyp.criterion, Criterion::L1);
    }

    #[test]
    fn test_resolve_rejects_label_width_mismatch() {
        // A regression dataset whose rows carry 3 label values
        // cannot feed a 1-wide head
        assert!(resolve_for("mosei_senti", 3).is_err());
        // iemocap needs exactly output_dim / 2 = 4 classes
        assert!(resolve_for("iemocap", 3).is_err());
        assert!(resolve_for("iemocap", 4).is_ok());
    }

    #[test]
    fn test_model_config_mirrors_the_resolved_value() {
        let hyp = resolve_for("iemocap", 4).unwrap();
        let cfg = hyp.model_config();
        assert_eq!(cfg.orig_d_text, 3);
        assert_eq!(cfg.output_dim, 8);
        assert_eq!(cfg.layers, hyp.layers);
        // trimodal: three branches at 2 x proj_dim each
        assert_eq!(cfg.combined_dim(), 6 * cfg.proj_dim);
    }

    #[test]
    fn test_hyperparams_json_roundtrip() {
        let hyp = resolve_for("mosei_senti", 1).unwrap();
        let json = serde_json::to_string(&hyp).unwrap();
        let back: HyperParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dataset, hyp.dataset);
        assert_eq!(back.seed, hyp.seed);
        assert_eq!(back.output_dim, hyp.output_dim);
    }
}
