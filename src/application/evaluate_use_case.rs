// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Re-runs the test-set evaluation of a finished training run:
//
//   Step 1: Reload hyperparams.json      (Layer 6 - infra)
//   Step 2: Resolve compute device       (Layer 6 - infra)
//   Step 3: Load the test split          (Layer 4 - data)
//   Step 4: Rebuild model, best weights  (Layer 5 - ml)
//   Step 5: Collect predictions + report (Layer 5 - ml)
//
// The architecture is rebuilt from the SAVED hyperparameters,
// not from fresh CLI flags, so the checkpoint always meets a
// model of exactly the shape it was trained with. Only the
// data path and the device choice may differ from train time.
//
// Reference: Burn Book §6 (Saving and Loading Models)

use anyhow::{bail, Result};
use burn::data::dataloader::DataLoaderBuilder;
use burn::prelude::Backend;

use crate::application::hyperparams::HyperParams;
use crate::data::{
    batcher::MultimodalBatcher,
    dataset::MultimodalDataset,
    loader::JsonlSplitLoader,
};
use crate::domain::{sample::Split, traits::SampleSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    device::{self, ComputeBackend},
};
use crate::ml::evaluate;

// ─── Evaluation Options ───────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct EvaluateOptions {
    /// Where hyperparams.json and the checkpoints live
    pub checkpoint_dir: String,

    /// Overrides the data path recorded at train time
    pub data_path: Option<String>,

    pub no_gpu: bool,
}

// ─── EvaluateUseCase ──────────────────────────────────────────────────────────
pub struct EvaluateUseCase {
    options: EvaluateOptions,
}

impl EvaluateUseCase {
    pub fn new(options: EvaluateOptions) -> Self {
        Self { options }
    }

    pub fn execute(&self) -> Result<()> {
        // ── Step 1: Reload the resolved hyperparameters ───────────────────────
        let ckpt = CheckpointManager::new(&self.options.checkpoint_dir);
        let hyp  = ckpt.load_hyperparams()?;
        let data_path = self
            .options
            .data_path
            .clone()
            .unwrap_or_else(|| hyp.data_path.clone());

        tracing::info!(
            "Evaluating trial '{}' ({} on {})",
            hyp.name,
            hyp.model.as_str(),
            hyp.dataset.name()
        );

        // ── Step 2: Resolve the compute device ────────────────────────────────
        let plan = device::resolve(self.options.no_gpu);

        // ── Step 3: Load the test split ───────────────────────────────────────
        let source  = JsonlSplitLoader::new(&data_path, hyp.dataset.name(), hyp.aligned);
        let samples = source.load_split(Split::Test)?;
        let test    = MultimodalDataset::new(samples);

        // The file on disk must still describe the model we
        // trained; a regenerated dataset with new dims would
        // otherwise fail inside the first matmul.
        if test.feature_dims() != (hyp.orig_d_l, hyp.orig_d_a, hyp.orig_d_v)
            || test.seq_lens() != (hyp.l_len, hyp.a_len, hyp.v_len)
            || test.label_dim() != hyp.label_dim
        {
            bail!(
                "test split at '{}' does not match the trained model: \
                 expected dims {:?} / lengths {:?} / label width {}, \
                 found {:?} / {:?} / {}",
                data_path,
                (hyp.orig_d_l, hyp.orig_d_a, hyp.orig_d_v),
                (hyp.l_len, hyp.a_len, hyp.v_len),
                hyp.label_dim,
                test.feature_dims(),
                test.seq_lens(),
                test.label_dim(),
            );
        }

        // ── Step 4+5: Rebuild the model on the chosen backend and report ──────
        match plan.backend {
            ComputeBackend::Accelerator => {
                let device = burn::backend::wgpu::WgpuDevice::default();
                tracing::info!("Evaluating on the wgpu accelerator backend");
                evaluate_on::<burn::backend::Wgpu>(&hyp, &ckpt, test, device)
            }
            ComputeBackend::HostCpu => {
                let device = burn::backend::ndarray::NdArrayDevice::default();
                tracing::info!("Evaluating on the ndarray host backend");
                evaluate_on::<burn::backend::NdArray>(&hyp, &ckpt, test, device)
            }
        }
    }
}

/// Model rebuild + test pass, generic over the inference
/// backend. Evaluation takes no gradients, so the plain
/// backend is used rather than its autodiff wrapper.
fn evaluate_on<B: Backend>(
    hyp:    &HyperParams,
    ckpt:   &CheckpointManager,
    test:   MultimodalDataset,
    device: B::Device,
) -> Result<()> {
    let model = ckpt.load_best::<B>(hyp.model_config().init(&device), &hyp.name, &device)?;

    let batcher = MultimodalBatcher::<B>::new(device.clone());
    let loader  = DataLoaderBuilder::new(batcher)
        .batch_size(hyp.batch_size)
        .num_workers(1)
        .build(test);

    let (preds, truths) = evaluate::collect_predictions(&model, loader.as_ref());
    let test_loss = evaluate::average_loss(hyp.criterion, &preds, &truths);

    evaluate::print_report(&hyp.dataset, &preds, &truths, hyp.label_dim);
    println!("Best-model test loss: {test_loss:.4}");

    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use std::io::Write as _;
    use std::path::PathBuf;

    use crate::application::train_use_case::TrainOptions;
    use crate::domain::dataset_kind::DatasetKind;
    use crate::domain::modality::ModalitySelection;
    use crate::domain::model_kind::{ModelKind, OptimKind};
    use crate::domain::sample::{MultimodalSample, SegmentMeta};

    /// One JSONL line matching `stub_sample`'s shapes:
    /// text 2x2, audio 3x1, vision 1x4, one label value.
    fn feature_row(segment: &str, label: f32) -> String {
        format!(
            r#"{{"segment":"{segment}","start":0.0,"end":1.0,"text":[[0.1,0.2],[0.3,0.4]],"audio":[[0.5],[0.6],[0.7]],"vision":[[0.8,0.9,1.0,1.1]],"label":[{label}]}}"#
        )
    }

    fn stub_sample(index: usize) -> MultimodalSample {
        MultimodalSample {
            index,
            text:    vec![vec![0.1, 0.2], vec![0.3, 0.4]],
            audio:   vec![vec![0.5], vec![0.6], vec![0.7]],
            vision:  vec![vec![0.8, 0.9, 1.0, 1.1]],
            label:   vec![0.5],
            meta:    SegmentMeta::new(format!("e[{index}]"), 0.0, 1.0),
            labeled: true,
        }
    }

    fn write_test_split(data_dir: &PathBuf, rows: &[String]) {
        let split_dir = data_dir.join("mosei_senti");
        std::fs::create_dir_all(&split_dir).unwrap();
        let mut f = std::fs::File::create(split_dir.join("test_noalign.jsonl")).unwrap();
        for row in rows {
            writeln!(f, "{row}").unwrap();
        }
    }

    /// Resolve hyperparameters exactly as `train` would, with a
    /// small architecture so the checkpoint stays tiny.
    fn saved_run(ckpt_dir: &PathBuf, data_dir: &PathBuf) -> HyperParams {
        let opts = TrainOptions {
            nlevels:        1,
            num_heads:      2,
            checkpoint_dir: ckpt_dir.to_string_lossy().into_owned(),
            data_path:      data_dir.to_string_lossy().into_owned(),
            ..TrainOptions::default()
        };
        let split = MultimodalDataset::new(vec![stub_sample(0), stub_sample(1)]);
        let hyp = HyperParams::resolve(
            &opts,
            ModelKind::Mult,
            OptimKind::Adam,
            DatasetKind::parse(&opts.dataset),
            ModalitySelection::from_flags(false, false, false).unwrap(),
            &split,
            &split,
            &split,
        )
        .unwrap();

        let ckpt = CheckpointManager::new(opts.checkpoint_dir.clone());
        ckpt.save_hyperparams(&hyp).unwrap();
        let model = hyp.model_config().init::<Autodiff<NdArray>>(&Default::default());
        ckpt.save_best(&model, &hyp.name).unwrap();
        hyp
    }

    #[test]
    fn test_evaluate_round_trip_from_saved_run() {
        let root = std::env::temp_dir().join(format!("mult-sentiment-eval-{}", std::process::id()));
        let ckpt_dir = root.join("ckpt");
        let data_dir = root.join("data");
        write_test_split(&data_dir, &[feature_row("e[0]", 0.5), feature_row("e[1]", -1.0)]);
        saved_run(&ckpt_dir, &data_dir);

        // hyperparams.json + best checkpoint + split file are
        // everything `evaluate` is allowed to rely on
        let use_case = EvaluateUseCase::new(EvaluateOptions {
            checkpoint_dir: ckpt_dir.to_string_lossy().into_owned(),
            data_path:      None,
            no_gpu:         true,
        });
        use_case.execute().unwrap();
    }

    #[test]
    fn test_regenerated_split_with_new_shapes_is_rejected() {
        let root = std::env::temp_dir().join(format!(
            "mult-sentiment-eval-shape-{}",
            std::process::id()
        ));
        let ckpt_dir = root.join("ckpt");
        let data_dir = root.join("data");
        // Audio now has four timesteps instead of the three the
        // model was trained with
        let wide = r#"{"segment":"e[0]","start":0.0,"end":1.0,"text":[[0.1,0.2],[0.3,0.4]],"audio":[[0.5],[0.6],[0.7],[0.8]],"vision":[[0.8,0.9,1.0,1.1]],"label":[0.5]}"#;
        write_test_split(&data_dir, &[wide.to_string()]);
        saved_run(&ckpt_dir, &data_dir);

        let use_case = EvaluateUseCase::new(EvaluateOptions {
            checkpoint_dir: ckpt_dir.to_string_lossy().into_owned(),
            data_path:      None,
            no_gpu:         true,
        });
        let err = use_case.execute().unwrap_err();
        assert!(
            format!("{err:#}").contains("does not match the trained model"),
            "error: {err:#}"
        );
    }

    #[test]
    fn test_missing_run_names_the_remedy() {
        let dir = std::env::temp_dir().join(format!(
            "mult-sentiment-eval-missing-{}",
            std::process::id()
        ));
        let use_case = EvaluateUseCase::new(EvaluateOptions {
            checkpoint_dir: dir.to_string_lossy().into_owned(),
            data_path:      None,
            no_gpu:         true,
        });
        let err = use_case.execute().unwrap_err();
        assert!(format!("{err:#}").contains("'train' before 'evaluate'"));
    }
}
