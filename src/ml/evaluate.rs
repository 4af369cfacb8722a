// ============================================================
// Layer 5 — Evaluation Metrics
// ============================================================
// Dataset-appropriate quality metrics, computed host-side over
// plain f32 slices. Predictions are collected once from the
// model, moved off the device, and every metric is ordinary
// CPU arithmetic — no need to express argmax-and-count logic
// as tensor kernels.
//
// Sentiment datasets (mosi / mosei_senti / unknown) regress a
// score in [-3, 3] and report:
//   - MAE and Pearson correlation on the raw scores
//   - 7-class / 5-class accuracy: both sides clamped to ±3 / ±2
//     and rounded to the nearest integer bucket
//   - binary accuracy and weighted F1 on sign(score), with
//     truly-neutral samples (truth == 0) excluded — a neutral
//     ground truth has no sign to get right
//
// Emotion datasets (iemocap) predict 4 emotions x 2 classes and
// report per-emotion accuracy and weighted F1 over the paired
// logits' argmax.
//
// Weighted F1 averages the per-class F1 scores weighted by each
// class's support in the ground truth, so a skewed class
// balance cannot hide a collapsed classifier.
//
// Reference: Rust Book §13 (Iterators),
//            Tsai et al. (2019) evaluation protocol

use burn::{data::dataloader::DataLoader, prelude::*};

use crate::data::batcher::MultimodalBatch;
use crate::domain::dataset_kind::{Criterion, DatasetKind};
use crate::ml::model::MultModel;

/// Emotion names for the iemocap label order.
const EMOTIONS: [&str; 4] = ["Neutral", "Happy", "Sad", "Angry"];

// ─── Prediction collection ────────────────────────────────────────────────────

/// Run the model over a loader and flatten predictions and
/// ground truths into host vectors (row-major, input order).
pub fn collect_predictions<B: Backend>(
    model:  &MultModel<B>,
    loader: &dyn DataLoader<MultimodalBatch<B>>,
) -> (Vec<f32>, Vec<f32>) {
    let mut preds  = Vec::new();
    let mut truths = Vec::new();

    for batch in loader.iter() {
        let output = model.forward(batch.text, batch.audio, batch.vision);
        preds.extend(output.into_data().iter::<f32>());
        truths.extend(batch.labels.into_data().iter::<f32>());
    }

    (preds, truths)
}

// ─── Scalar metrics ───────────────────────────────────────────────────────────

/// Average criterion loss over already-collected predictions.
/// Mirrors the training criterion exactly, so the reported test
/// loss is comparable to the per-epoch validation losses.
pub fn average_loss(criterion: Criterion, preds: &[f32], truths: &[f32]) -> f64 {
    match criterion {
        Criterion::L1           => mean_absolute_error(preds, truths),
        Criterion::CrossEntropy => paired_cross_entropy(preds, truths),
    }
}

/// Cross entropy over paired logits, averaged over every
/// (sample, class) pair. preds holds two logits per truth entry.
fn paired_cross_entropy(logits: &[f32], targets: &[f32]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0f64;
    for (j, &t) in targets.iter().enumerate() {
        let a = logits[2 * j];
        let b = logits[2 * j + 1];
        // log-sum-exp, shifted for stability
        let m = a.max(b);
        let lse = m + ((a - m).exp() + (b - m).exp()).ln();
        let picked = if t > 0.5 { b } else { a };
        sum += f64::from(lse - picked);
    }
    sum / targets.len() as f64
}

pub fn mean_absolute_error(preds: &[f32], truths: &[f32]) -> f64 {
    if preds.is_empty() {
        return 0.0;
    }
    let sum: f64 = preds
        .iter()
        .zip(truths)
        .map(|(p, t)| f64::from((p - t).abs()))
        .sum();
    sum / preds.len() as f64
}

/// Pearson correlation coefficient. Flat inputs (zero variance)
/// have no defined correlation and report 0.
pub fn pearson_correlation(preds: &[f32], truths: &[f32]) -> f64 {
    let n = preds.len();
    if n == 0 {
        return 0.0;
    }
    let mean_p: f64 = preds.iter().map(|&p| f64::from(p)).sum::<f64>() / n as f64;
    let mean_t: f64 = truths.iter().map(|&t| f64::from(t)).sum::<f64>() / n as f64;

    let mut cov  = 0.0;
    let mut varp = 0.0;
    let mut vart = 0.0;
    for (&p, &t) in preds.iter().zip(truths) {
        let dp = f64::from(p) - mean_p;
        let dt = f64::from(t) - mean_t;
        cov  += dp * dt;
        varp += dp * dp;
        vart += dt * dt;
    }

    if varp == 0.0 || vart == 0.0 {
        0.0
    } else {
        cov / (varp.sqrt() * vart.sqrt())
    }
}

/// Bucketed accuracy: clamp both sides to ±limit, round to the
/// nearest integer, count exact bucket matches.
pub fn multiclass_accuracy(preds: &[f32], truths: &[f32], limit: f32) -> f64 {
    if preds.is_empty() {
        return 0.0;
    }
    let bucket = |v: f32| v.clamp(-limit, limit).round();
    let correct = preds
        .iter()
        .zip(truths)
        .filter(|(&p, &t)| bucket(p) == bucket(t))
        .count();
    correct as f64 / preds.len() as f64
}

/// Sign accuracy with neutral ground truths excluded.
pub fn binary_accuracy_nonzero(preds: &[f32], truths: &[f32]) -> f64 {
    let (preds, truths) = nonzero_signs(preds, truths);
    if truths.is_empty() {
        return 0.0;
    }
    let correct = preds.iter().zip(&truths).filter(|(p, t)| p == t).count();
    correct as f64 / truths.len() as f64
}

/// Weighted F1 on sign(score), neutral ground truths excluded.
pub fn weighted_f1_nonzero(preds: &[f32], truths: &[f32]) -> f64 {
    let (preds, truths) = nonzero_signs(preds, truths);
    weighted_f1_binary(&preds, &truths)
}

/// Keep only pairs whose truth is non-zero, reduced to signs.
fn nonzero_signs(preds: &[f32], truths: &[f32]) -> (Vec<bool>, Vec<bool>) {
    preds
        .iter()
        .zip(truths)
        .filter(|(_, &t)| t != 0.0)
        .map(|(&p, &t)| (p > 0.0, t > 0.0))
        .unzip()
}

/// Per-class F1 averaged with ground-truth support weights.
fn weighted_f1_binary(preds: &[bool], truths: &[bool]) -> f64 {
    let total = truths.len();
    if total == 0 {
        return 0.0;
    }

    let mut weighted_sum = 0.0;
    for class in [false, true] {
        let support = truths.iter().filter(|&&t| t == class).count();
        if support == 0 {
            continue;
        }

        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fnn = 0usize;
        for (&p, &t) in preds.iter().zip(truths) {
            if p == class && t == class {
                tp += 1;
            } else if p == class {
                fp += 1;
            } else if t == class {
                fnn += 1;
            }
        }

        let precision = if tp + fp  == 0 { 0.0 } else { tp as f64 / (tp + fp) as f64 };
        let recall    = if tp + fnn == 0 { 0.0 } else { tp as f64 / (tp + fnn) as f64 };
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        weighted_sum += f1 * support as f64;
    }

    weighted_sum / total as f64
}

// ─── Reports ──────────────────────────────────────────────────────────────────

/// Metric set for sentiment regression datasets.
#[derive(Debug, Clone)]
pub struct SentimentReport {
    pub mae:        f64,
    pub corr:       f64,
    pub acc7:       f64,
    pub acc5:       f64,
    pub f1:         f64,
    pub binary_acc: f64,
}

impl SentimentReport {
    pub fn compute(preds: &[f32], truths: &[f32]) -> Self {
        Self {
            mae:        mean_absolute_error(preds, truths),
            corr:       pearson_correlation(preds, truths),
            acc7:       multiclass_accuracy(preds, truths, 3.0),
            acc5:       multiclass_accuracy(preds, truths, 2.0),
            f1:         weighted_f1_nonzero(preds, truths),
            binary_acc: binary_accuracy_nonzero(preds, truths),
        }
    }

    pub fn print(&self) {
        println!("MAE:                     {:.4}", self.mae);
        println!("Correlation coefficient: {:.4}", self.corr);
        println!("7-class accuracy:        {:.4}", self.acc7);
        println!("5-class accuracy:        {:.4}", self.acc5);
        println!("F1 score (non-neutral):  {:.4}", self.f1);
        println!("Binary accuracy:         {:.4}", self.binary_acc);
        println!("{}", "-".repeat(50));
    }
}

/// Accuracy and F1 for one emotion of an iemocap-style dataset.
#[derive(Debug, Clone)]
pub struct EmotionScore {
    pub emotion:  String,
    pub accuracy: f64,
    pub f1:       f64,
}

#[derive(Debug, Clone)]
pub struct EmotionReport {
    pub scores: Vec<EmotionScore>,
}

impl EmotionReport {
    /// preds: flattened [n, emotions, 2] paired logits;
    /// truths: flattened [n, emotions] class bits.
    pub fn compute(preds: &[f32], truths: &[f32], emotions: usize) -> Self {
        let n = if emotions == 0 { 0 } else { truths.len() / emotions };
        let mut scores = Vec::with_capacity(emotions);

        for emo in 0..emotions {
            let mut pred_class  = Vec::with_capacity(n);
            let mut truth_class = Vec::with_capacity(n);
            for i in 0..n {
                // argmax over the two paired logits of this emotion
                let base = i * emotions * 2 + emo * 2;
                pred_class.push(preds[base + 1] > preds[base]);
                truth_class.push(truths[i * emotions + emo] > 0.5);
            }

            let correct = pred_class
                .iter()
                .zip(&truth_class)
                .filter(|(p, t)| p == t)
                .count();
            let accuracy = if n == 0 { 0.0 } else { correct as f64 / n as f64 };

            scores.push(EmotionScore {
                emotion:  emotion_name(emo),
                accuracy,
                f1: weighted_f1_binary(&pred_class, &truth_class),
            });
        }

        Self { scores }
    }

    pub fn print(&self) {
        for score in &self.scores {
            println!("{}:", score.emotion);
            println!("  - Accuracy: {:.4}", score.accuracy);
            println!("  - F1 score: {:.4}", score.f1);
        }
        println!("{}", "-".repeat(50));
    }
}

fn emotion_name(index: usize) -> String {
    match EMOTIONS.get(index) {
        Some(name) => (*name).to_string(),
        None       => format!("Emotion {index}"),
    }
}

/// Print the metric set appropriate for the dataset.
pub fn print_report(dataset: &DatasetKind, preds: &[f32], truths: &[f32], label_dim: usize) {
    match dataset {
        DatasetKind::Iemocap => EmotionReport::compute(preds, truths, label_dim).print(),
        _ => SentimentReport::compute(preds, truths).print(),
    }
}
