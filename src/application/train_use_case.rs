// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate flags and names   (Layer 3 - domain)
//   Step 2: Resolve compute device     (Layer 6 - infra)
//   Step 3: Load the three splits      (Layer 4 - data)
//   Step 4: Cross-check split shapes   (Layer 4 - data)
//   Step 5: Apply the labeled ratio    (Layer 4 - data)
//   Step 6: Build Burn datasets        (Layer 4 - data)
//   Step 7: Resolve hyperparameters    (Layer 2 - application)
//   Step 8: Save hyperparams.json      (Layer 6 - infra)
//   Step 9: Run training loop          (Layer 5 - ml)
//
// Validation deliberately comes first: a typo'd model name or
// a contradictory pair of modality flags must fail before the
// program spends time reading three feature files.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;

use crate::application::hyperparams::HyperParams;
use crate::data::{
    dataset::{validate_split_agreement, MultimodalDataset},
    labeling::apply_labeled_ratio,
    loader::JsonlSplitLoader,
};
use crate::domain::{
    dataset_kind::DatasetKind,
    modality::ModalitySelection,
    model_kind::{ModelKind, OptimKind},
    sample::Split,
    traits::SampleSource,
};
use crate::infra::{checkpoint::CheckpointManager, device};
use crate::ml::trainer::run_training;

// ─── Training Options ─────────────────────────────────────────────────────────
// Everything the user can choose on the command line, still in
// raw form: names are unvalidated strings, flags are plain
// bools. `HyperParams::resolve` turns this into the immutable,
// data-aware configuration that the rest of the run consumes.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    // ── Identity ──
    /// Architecture name (normalised to uppercase; only MULT is known)
    pub model:   String,
    /// Trial name — keys the checkpoint files
    pub name:    String,
    pub dataset: String,
    /// Aligned features, or the _noalign variant
    pub aligned: bool,

    // ── Modality exclusivity flags ──
    pub lonly: bool,
    pub aonly: bool,
    pub vonly: bool,

    // ── Architecture ──
    /// Layers per crossmodal stack
    pub nlevels:        usize,
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
    pub optim:        String,
    pub batch_size:   usize,
    pub clip:         f64,
    pub lr:           f64,
    pub num_epochs:   usize,
    /// Plateau patience before the learning rate decays
    pub when:         usize,
    pub log_interval: usize,
    pub seed:         u64,

    // ── Semi-supervised ──
    pub labeled_ratio:               f64,
    pub pseudolabel_threshold:       f64,
    pub pseudolabel_update_interval: usize,
    pub lambda_u:                    f64,

    // ── Environment ──
    pub data_path:      String,
    pub checkpoint_dir: String,
    pub no_gpu:         bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            model:   "MulT".to_string(),
            name:    "mult".to_string(),
            dataset: "mosei_senti".to_string(),
            aligned: false,

            lonly: false,
            aonly: false,
            vonly: false,

            nlevels:        5,
            num_heads:      5,
            attn_mask:      true,
            attn_dropout:   0.1,
            attn_dropout_a: 0.0,
            attn_dropout_v: 0.0,
            relu_dropout:   0.1,
            embed_dropout:  0.25,
            res_dropout:    0.1,
            out_dropout:    0.0,

            optim:        "Adam".to_string(),
            batch_size:   24,
            clip:         0.8,
            lr:           1e-3,
            num_epochs:   40,
            when:         20,
            log_interval: 30,
            seed:         1111,

            labeled_ratio:               0.5,
            pseudolabel_threshold:       0.95,
            pseudolabel_update_interval: 100,
            lambda_u:                    1.0,

            data_path:      "data".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            no_gpu:         false,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the options and runs the full training pipeline.
pub struct TrainUseCase {
    options: TrainOptions,
}

impl TrainUseCase {
    pub fn new(options: TrainOptions) -> Self {
        Self { options }
    }

    /// Execute the full training pipeline end to end.
    pub fn execute(&self) -> Result<()> {
        let opts = &self.options;

        // ── Step 1: Validate flags and names ──────────────────────────────────
        // Everything the user could get wrong is checked here,
        // before a single feature file is opened.
        let modalities = ModalitySelection::from_flags(opts.lonly, opts.aonly, opts.vonly)?;
        let model      = ModelKind::parse(&opts.model)?;
        let optim      = OptimKind::parse(&opts.optim)?;
        let dataset    = DatasetKind::parse(&opts.dataset);

        // ── Step 2: Resolve the compute device ────────────────────────────────
        // Probes for a GPU adapter and honours --no-gpu, warning
        // when the flag and the hardware disagree.
        let plan = device::resolve(opts.no_gpu);

        // ── Step 3: Load the three splits ─────────────────────────────────────
        println!("Start loading the data....");
        let source = JsonlSplitLoader::new(&opts.data_path, dataset.name(), opts.aligned);
        let mut train_samples = source.load_split(Split::Train)?;
        let valid_samples     = source.load_split(Split::Valid)?;
        let test_samples      = source.load_split(Split::Test)?;
        println!("Finish loading the data....");
        if !opts.aligned {
            println!("### Note: You are running in unaligned mode.");
        }

        // ── Step 4: Cross-check split shapes ──────────────────────────────────
        // Each split is internally rectangular (the loader
        // enforced that); here the three splits must also agree
        // with EACH OTHER, or the train-time model could never
        // consume the test split.
        validate_split_agreement(&train_samples, &valid_samples, &test_samples)?;

        // ── Step 5: Apply the labeled ratio ───────────────────────────────────
        // Only the train split is masked; validation and test
        // keep every label.
        apply_labeled_ratio(&mut train_samples, opts.labeled_ratio, opts.seed);

        // ── Step 6: Build Burn datasets ───────────────────────────────────────
        let train = MultimodalDataset::new(train_samples);
        let valid = MultimodalDataset::new(valid_samples);
        let test  = MultimodalDataset::new(test_samples);

        // ── Step 7: Resolve hyperparameters ───────────────────────────────────
        // Folds CLI options together with what the loaded data
        // reports about itself (dims, lengths, split sizes).
        let hyp = HyperParams::resolve(opts, model, optim, dataset, modalities, &train, &valid, &test)?;

        // ── Step 8: Save hyperparams.json ─────────────────────────────────────
        // `evaluate` rebuilds the identical model from this file.
        let ckpt = CheckpointManager::new(&opts.checkpoint_dir);
        ckpt.save_hyperparams(&hyp)?;

        // ── Step 9: Run training loop (Layer 5) ───────────────────────────────
        let test_loss = run_training(&hyp, &plan, train, valid, test, ckpt)?;
        println!("Best-model test loss: {test_loss:.4}");

        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::data::dataloader::DataLoaderBuilder;

    use crate::data::batcher::MultimodalBatcher;
    use crate::domain::sample::{MultimodalSample, SegmentMeta};

    fn stub_sample(index: usize) -> MultimodalSample {
        let v = index as f32;
        MultimodalSample {
            index,
            text:    vec![vec![v, v + 0.1]; 4],
            audio:   vec![vec![v + 0.2]; 3],
            vision:  vec![vec![v + 0.3, v + 0.4, v + 0.5]; 2],
            label:   vec![0.5],
            meta:    SegmentMeta::new(format!("seg[{index}]"), 0.0, 1.0),
            labeled: true,
        }
    }

    fn stub_split() -> MultimodalDataset {
        MultimodalDataset::new(vec![stub_sample(0), stub_sample(1)])
    }

    #[test]
    fn test_defaults_match_the_reference_recipe() {
        let opts = TrainOptions::default();
        assert_eq!(opts.dataset, "mosei_senti");
        assert_eq!(opts.batch_size, 24);
        assert_eq!(opts.nlevels, 5);
        assert_eq!(opts.seed, 1111);
        assert!(opts.attn_mask);
        assert!(!opts.aligned);
        assert_eq!(opts.pseudolabel_update_interval, 100);
    }

    #[test]
    fn test_invalid_model_name_fails_before_loading() {
        // The data path does not exist; a bad model name must
        // still fail with ITS error, proving validation runs
        // before any file access.
        let opts = TrainOptions {
            model: "Transformer".to_string(),
            data_path: "/nonexistent".to_string(),
            ..TrainOptions::default()
        };
        let err = TrainUseCase::new(opts).execute().unwrap_err();
        assert!(format!("{err:#}").contains("unknown model"));
    }

    #[test]
    fn test_conflicting_modality_flags_fail_before_loading() {
        let opts = TrainOptions {
            lonly: true,
            aonly: true,
            data_path: "/nonexistent".to_string(),
            ..TrainOptions::default()
        };
        assert!(TrainUseCase::new(opts).execute().is_err());
    }

    /// End-to-end through the data plumbing with default flags:
    /// a two-sample split and batch size 2 must come out as one
    /// batch of two rows, and the default dataset's head must
    /// produce a single value per row.
    #[test]
    fn test_default_run_shapes_on_a_stub_split() {
        let opts = TrainOptions {
            batch_size: 2,
            ..TrainOptions::default()
        };
        let selection = ModalitySelection::from_flags(opts.lonly, opts.aonly, opts.vonly).unwrap();
        let dataset   = DatasetKind::parse(&opts.dataset);

        let hyp = HyperParams::resolve(
            &opts,
            ModelKind::Mult,
            OptimKind::Adam,
            dataset,
            selection,
            &stub_split(),
            &stub_split(),
            &stub_split(),
        )
        .unwrap();
        assert_eq!(hyp.output_dim, 1);
        assert_eq!(hyp.n_train, 2);

        let device  = Default::default();
        let batcher = MultimodalBatcher::<NdArray>::new(device);
        let loader  = DataLoaderBuilder::new(batcher)
            .batch_size(hyp.batch_size)
            .num_workers(1)
            .build(stub_split());

        let batches: Vec<_> = loader.iter().collect();
        assert_eq!(batches.len(), 1);
        let batch = batches.into_iter().next().unwrap();
        assert_eq!(batch.size(), 2);
        assert_eq!(batch.text.dims(), [2, 4, 2]);

        let model  = hyp.model_config().init::<NdArray>(&Default::default());
        let output = model.forward(batch.text, batch.audio, batch.vision);
        assert_eq!(output.dims(), [2, 1]);
    }
}
