// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full semi-supervised train + validation loop using Burn's
// DataLoader and Adam, generic over the autodiff backend so
// the device policy (infra::device) can pick wgpu or ndarray
// at runtime without any global tensor-kind state.
//
// Key Burn insight:
//   - Training uses B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - Validation/test loaders must batch on B::InnerBackend
//   - AutodiffBackend guarantees the inner backend shares the
//     same Device type, so one device value serves both
//
// The loss per training batch:
//
//   loss = masked_mean(criterion, labeled samples)
//        + lambda_u * masked_mean(criterion, pseudo-labeled)
//
// Both terms run over the SAME forward pass; masking (0/1
// weights per sample) keeps unlabeled rows out of the
// supervised term and labeled rows out of the pseudo term.
// Every --pseudolabel-update-interval optimiser steps the
// pseudo-label store is refreshed from the current batch.
//
// Learning-rate schedule: when validation loss has not
// improved for `when` consecutive epochs, lr is multiplied by
// 0.1 (classic reduce-on-plateau).
//
// After the final epoch the best checkpoint is reloaded and
// the test split is evaluated once, host-side, producing the
// scalar test loss plus the dataset-appropriate metric set.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam,
//            Sohn et al. (2020) FixMatch
use std::time::Instant;

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    grad_clipping::GradientClippingConfig,
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{activation, backend::AutodiffBackend},
};

use crate::application::hyperparams::HyperParams;
use crate::data::{
    batcher::{MultimodalBatch, MultimodalBatcher},
    dataset::MultimodalDataset,
};
use crate::domain::dataset_kind::Criterion;
use crate::infra::{
    checkpoint::CheckpointManager,
    device::{ComputeBackend, DevicePlan},
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    evaluate,
    model::MultModel,
    pseudo_label::{label_range_from, PseudoLabelStore, PseudoTask},
};

/// Dispatch on the resolved device plan and run the full
/// training pipeline. Returns the final test-set loss.
pub fn run_training(
    hyp:   &HyperParams,
    plan:  &DevicePlan,
    train: MultimodalDataset,
    valid: MultimodalDataset,
    test:  MultimodalDataset,
    ckpt:  CheckpointManager,
) -> Result<f64> {
    match plan.backend {
        ComputeBackend::Accelerator => {
            let device = burn::backend::wgpu::WgpuDevice::default();
            tracing::info!("Training on the wgpu accelerator backend");
            train_loop::<burn::backend::Autodiff<burn::backend::Wgpu>>(
                hyp, train, valid, test, ckpt, device,
            )
        }
        ComputeBackend::HostCpu => {
            let device = burn::backend::ndarray::NdArrayDevice::default();
            tracing::info!("Training on the ndarray host backend");
            train_loop::<burn::backend::Autodiff<burn::backend::NdArray>>(
                hyp, train, valid, test, ckpt, device,
            )
        }
    }
}

fn train_loop<B: AutodiffBackend>(
    hyp:    &HyperParams,
    train:  MultimodalDataset,
    valid:  MultimodalDataset,
    test:   MultimodalDataset,
    ckpt:   CheckpointManager,
    device: B::Device,
) -> Result<f64> {
    // Backend generators are seeded per run; host-side RNG was
    // already seeded where the labeled mask was drawn
    B::seed(hyp.seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: MultModel<B> = hyp.model_config().init(&device);
    tracing::info!(
        "Model ready: {} target branch(es), {} crossmodal layers, {} parameters",
        hyp.modalities.active_count(),
        hyp.layers,
        model.num_params(),
    );

    // ── Adam optimiser with L2-norm gradient clipping ─────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let optim_cfg = AdamConfig::new()
        .with_epsilon(1e-8)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(hyp.clip as f32)));
    let mut optim = optim_cfg.init();

    // ── Pseudo-label store ────────────────────────────────────────────────────
    // Regression admission is scaled by the spread of the labels
    // we are allowed to see (the labeled part of the train split)
    let task = match hyp.criterion {
        Criterion::CrossEntropy => PseudoTask::Classification,
        Criterion::L1 => PseudoTask::Regression {
            label_range: label_range_from(&train.labeled_values()),
        },
    };
    let mut pseudo = PseudoLabelStore::new(
        task,
        hyp.pseudolabel_threshold,
        hyp.pseudolabel_update_interval,
    );

    // ── Training data loader (autodiff backend) ───────────────────────────────
    let train_batcher = MultimodalBatcher::<B>::new(device.clone());
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(hyp.batch_size)
        .shuffle(hyp.seed)
        .num_workers(1)
        .build(train);

    // ── Validation / test loaders (inner backend, no autodiff) ────────────────
    let valid_batcher = MultimodalBatcher::<B::InnerBackend>::new(device.clone());
    let valid_loader  = DataLoaderBuilder::new(valid_batcher)
        .batch_size(hyp.batch_size)
        .num_workers(1)
        .build(valid);

    let test_batcher = MultimodalBatcher::<B::InnerBackend>::new(device.clone());
    let test_loader  = DataLoaderBuilder::new(test_batcher)
        .batch_size(hyp.batch_size)
        .num_workers(1)
        .build(test);

    let metrics     = MetricsLogger::new(hyp.checkpoint_dir.clone())?;
    let mut plateau = PlateauDecay::new(hyp.when, 0.1);
    let mut lr      = hyp.lr;
    let mut best_valid = f64::INFINITY;
    let mut iteration  = 0usize;
    let num_batches = hyp.n_train.div_ceil(hyp.batch_size.max(1));

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=hyp.num_epochs {
        let epoch_start = Instant::now();

        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;
        let mut window_loss    = 0.0f64;
        let mut window_batches = 0usize;
        let mut window_start   = Instant::now();

        for (i_batch, batch) in train_loader.iter().enumerate() {
            iteration += 1;
            let [batch_n, label_dim] = batch.labels.dims();

            let preds = model.forward(batch.text, batch.audio, batch.vision);

            // ── Supervised term: labeled samples only ─────────────────────────
            let per_sample = criterion_per_sample(
                hyp.criterion,
                preds.clone(),
                batch.labels.clone(),
            );
            let supervised = masked_mean(per_sample, batch.mask.clone());

            // ── Pseudo-label refresh ──────────────────────────────────────────
            let mask_bits: Vec<f32> = batch.mask.into_data().iter::<f32>().collect();
            if pseudo.due(iteration) {
                let preds_host: Vec<f32> = preds.clone().into_data().iter::<f32>().collect();
                let width = hyp.output_dim;
                for (row, &index) in batch.indices.iter().enumerate() {
                    if mask_bits[row] == 0.0 {
                        pseudo.offer(index, &preds_host[row * width..(row + 1) * width]);
                    }
                }
                tracing::debug!(
                    "Refreshed pseudo-labels at iteration {iteration}: {} admitted",
                    pseudo.admitted(),
                );
            }

            // ── Unsupervised term: admitted pseudo-labels in this batch ───────
            let mut pseudo_flat = vec![0.0f32; batch_n * label_dim];
            let mut pseudo_bits = vec![0.0f32; batch_n];
            let mut in_batch    = 0usize;
            for (row, &index) in batch.indices.iter().enumerate() {
                if mask_bits[row] != 0.0 {
                    continue;
                }
                if let Some(label) = pseudo.label(index) {
                    if label.len() == label_dim {
                        pseudo_flat[row * label_dim..(row + 1) * label_dim]
                            .copy_from_slice(label);
                        pseudo_bits[row] = 1.0;
                        in_batch += 1;
                    }
                }
            }

            let loss = if in_batch > 0 && hyp.lambda_u > 0.0 {
                let pseudo_targets = Tensor::<B, 1>::from_floats(pseudo_flat.as_slice(), &device)
                    .reshape([batch_n, label_dim]);
                let pseudo_mask = Tensor::<B, 1>::from_floats(pseudo_bits.as_slice(), &device);
                let unsupervised = masked_mean(
                    criterion_per_sample(hyp.criterion, preds.clone(), pseudo_targets),
                    pseudo_mask,
                );
                supervised + unsupervised * hyp.lambda_u
            } else {
                supervised
            };

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            loss_sum += loss_val;
            batches  += 1;
            window_loss    += loss_val;
            window_batches += 1;

            // Backward pass + Adam update at the current lr
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);

            if hyp.log_interval > 0 && i_batch > 0 && i_batch % hyp.log_interval == 0 {
                let ms_per_batch =
                    window_start.elapsed().as_millis() as f64 / window_batches.max(1) as f64;
                println!(
                    "Epoch {:>2} | Batch {:>4}/{} | Time/Batch(ms) {:>7.2} | Train Loss {:.4}",
                    epoch,
                    i_batch,
                    num_batches,
                    ms_per_batch,
                    window_loss / window_batches.max(1) as f64,
                );
                window_loss    = 0.0;
                window_batches = 0;
                window_start   = Instant::now();
            }
        }

        let avg_train_loss = if batches > 0 {
            loss_sum / batches as f64
        } else {
            f64::NAN
        };

        // ── Validation phase ──────────────────────────────────────────────────
        // model.valid() → MultModel<B::InnerBackend>, dropout off
        let model_valid = model.valid();
        let valid_loss  = evaluate_loss(&model_valid, valid_loader.as_ref(), hyp.criterion);

        let row = EpochMetrics::new(epoch, avg_train_loss, valid_loss, lr, pseudo.admitted());
        metrics.log(&row)?;

        println!("{}", "-".repeat(50));
        println!(
            "Epoch {:>2} | Time {:>5.1}s | Train Loss {:.4} | Valid Loss {:.4} | Pseudo-labels {}",
            epoch,
            epoch_start.elapsed().as_secs_f64(),
            avg_train_loss,
            valid_loss,
            pseudo.admitted(),
        );
        println!("{}", "-".repeat(50));

        if row.is_improvement(best_valid) {
            best_valid = valid_loss;
            ckpt.save_best(&model, &hyp.name)?;
            tracing::info!("New best model at epoch {epoch} (valid loss {valid_loss:.4})");
        }

        let decayed = plateau.observe(valid_loss, lr);
        if decayed != lr {
            tracing::info!("Validation loss plateaued; lr {lr:.6} → {decayed:.6}");
            lr = decayed;
        }
    }

    // ── Final test evaluation with the best checkpoint ────────────────────────
    let best: MultModel<B::InnerBackend> =
        ckpt.load_best(hyp.model_config().init(&device), &hyp.name, &device)?;

    let (preds, truths) = evaluate::collect_predictions(&best, test_loader.as_ref());
    let test_loss = evaluate::average_loss(hyp.criterion, &preds, &truths);
    evaluate::print_report(&hyp.dataset, &preds, &truths, hyp.label_dim);

    tracing::info!("Training complete");
    Ok(test_loss)
}

/// Average criterion loss of a model over a loader, weighted by
/// batch size so partial final batches count fairly.
fn evaluate_loss<B: Backend>(
    model:     &MultModel<B>,
    loader:    &dyn DataLoader<MultimodalBatch<B>>,
    criterion: Criterion,
) -> f64 {
    let mut sum   = 0.0f64;
    let mut count = 0usize;

    for batch in loader.iter() {
        let n = batch.size();
        let preds = model.forward(batch.text, batch.audio, batch.vision);
        let per_sample = criterion_per_sample(criterion, preds, batch.labels);
        sum   += per_sample.sum().into_scalar().elem::<f64>();
        count += n;
    }

    if count > 0 {
        sum / count as f64
    } else {
        f64::NAN
    }
}

// ─── Loss building blocks ─────────────────────────────────────────────────────

/// Per-sample loss vector [n] for the dataset's criterion.
fn criterion_per_sample<B: Backend>(
    criterion: Criterion,
    preds:     Tensor<B, 2>,
    targets:   Tensor<B, 2>,
) -> Tensor<B, 1> {
    match criterion {
        Criterion::L1           => l1_per_sample(preds, targets),
        Criterion::CrossEntropy => ce_per_sample(preds, targets.int()),
    }
}

/// Mean absolute error per sample: [n, d] x [n, d] → [n]
fn l1_per_sample<B: Backend>(preds: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let [n, _] = preds.dims();
    (preds - targets).abs().mean_dim(1).reshape([n])
}

/// Paired-logit cross entropy per sample, averaged over pairs:
/// logits [n, 2k] x classes [n, k] → [n]
fn ce_per_sample<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2, Int>) -> Tensor<B, 1> {
    let [n, width] = logits.dims();
    let pairs = width / 2;

    // Each (logit pair, class) row becomes its own CE term
    let log_probs = activation::log_softmax(logits.reshape([n * pairs, 2]), 1);
    let picked = log_probs.gather(1, targets.reshape([n * pairs, 1]));

    picked.reshape([n, pairs]).mean_dim(1).reshape([n]).neg()
}

/// Mask-weighted mean: sum(per_sample * mask) / max(sum(mask), 1).
/// A fully masked-out batch contributes zero instead of NaN.
fn masked_mean<B: Backend>(per_sample: Tensor<B, 1>, mask: Tensor<B, 1>) -> Tensor<B, 1> {
    let weighted = (per_sample * mask.clone()).sum();
    weighted / mask.sum().clamp_min(1.0)
}

// ─── Plateau learning-rate decay ──────────────────────────────────────────────

/// Reduce-on-plateau: after `patience` + 1 consecutive epochs
/// without a new best validation loss, multiply lr by `factor`
/// and restart the count.
pub struct PlateauDecay {
    patience: usize,
    factor:   f64,
    best:     f64,
    stale:    usize,
}

impl PlateauDecay {
    pub fn new(patience: usize, factor: f64) -> Self {
        Self {
            patience,
            factor,
            best:  f64::INFINITY,
            stale: 0,
        }
    }

    /// Observe one epoch's validation loss; returns the lr to
    /// use from the next epoch on.
    pub fn observe(&mut self, valid_loss: f64, lr: f64) -> f64 {
        if valid_loss < self.best {
            self.best  = valid_loss;
            self.stale = 0;
            return lr;
        }

        self.stale += 1;
        if self.stale > self.patience {
            self.stale = 0;
            return lr * self.factor;
        }
        lr
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar().elem::<f32>()
    }

    #[test]
    fn test_plateau_decay_fires_after_patience_runs_out() {
        let mut decay = PlateauDecay::new(2, 0.1);
        let lr = 1e-3;

        // First observation is always an improvement over +inf
        assert_eq!(decay.observe(1.0, lr), lr);
        // Two stale epochs are tolerated...
        assert_eq!(decay.observe(1.1, lr), lr);
        assert_eq!(decay.observe(1.2, lr), lr);
        // ...the third one triggers the decay
        let decayed = decay.observe(1.3, lr);
        assert!((decayed - 1e-4).abs() < 1e-12);
    }

    #[test]
    fn test_plateau_decay_resets_on_improvement() {
        let mut decay = PlateauDecay::new(1, 0.1);
        let lr = 1e-3;

        assert_eq!(decay.observe(1.0, lr), lr);
        assert_eq!(decay.observe(1.5, lr), lr);
        // Improvement wipes the stale count
        assert_eq!(decay.observe(0.5, lr), lr);
        assert_eq!(decay.observe(0.9, lr), lr);
        // Second consecutive stale epoch decays
        assert!((decay.observe(0.9, lr) - 1e-4).abs() < 1e-12);
    }

    #[test]
    fn test_masked_mean_averages_only_selected_samples() {
        let device = Default::default();
        let per_sample = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0, 3.0, 4.0], &device);
        let mask       = Tensor::<TestBackend, 1>::from_floats([1.0, 0.0, 1.0, 0.0], &device);
        assert!((scalar(masked_mean(per_sample, mask)) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_masked_mean_of_nothing_is_zero() {
        let device = Default::default();
        let per_sample = Tensor::<TestBackend, 1>::from_floats([5.0, 7.0], &device);
        let mask       = Tensor::<TestBackend, 1>::from_floats([0.0, 0.0], &device);
        assert_eq!(scalar(masked_mean(per_sample, mask)), 0.0);
    }

    #[test]
    fn test_l1_per_sample_averages_label_elements() {
        let device  = Default::default();
        let preds   = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
        let targets = Tensor::<TestBackend, 2>::from_floats([[0.0, 2.0], [5.0, 4.0]], &device);
        let out: Vec<f32> = l1_per_sample(preds, targets).into_data().iter::<f32>().collect();
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ce_per_sample_on_uniform_logits_is_ln2() {
        let device  = Default::default();
        let logits  = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 0.0, 0.0]], &device);
        let targets = Tensor::<TestBackend, 2, Int>::from_ints([[0, 1]], &device);
        let out = scalar(ce_per_sample(logits, targets));
        assert!((out - std::f32::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn test_ce_per_sample_rewards_confident_correct_pairs() {
        let device  = Default::default();
        let logits  = Tensor::<TestBackend, 2>::from_floats([[10.0, -10.0, -10.0, 10.0]], &device);
        let targets = Tensor::<TestBackend, 2, Int>::from_ints([[0, 1]], &device);
        assert!(scalar(ce_per_sample(logits, targets)) < 1e-3);
    }
}
