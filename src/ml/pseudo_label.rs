// ============================================================
// Layer 5 — Pseudo-Label Store
// ============================================================
// Semi-supervised self-training: the model's own confident
// predictions on unlabeled samples become training targets.
//
// How it works:
//   1. Only a labeled_ratio fraction of the train split keeps
//      its ground-truth labels (data::labeling)
//   2. Every --pseudolabel-update-interval optimiser steps the
//      store is refreshed from the current batch's predictions
//   3. A prediction is admitted as a pseudo-label only when the
//      model is confident enough (--pseudolabel-threshold)
//   4. Admitted pseudo-labels join the loss with weight
//      --lambda-u (ml::trainer)
//
// What "confident" means depends on the task:
//   Classification (paired logits, e.g. 4 emotions x 2 classes):
//     every pair's softmax max-probability must reach the
//     threshold — one uncertain emotion blocks the whole sample.
//   Regression (scalar sentiment score):
//     softmax probabilities don't exist, so confidence is
//     prediction *stability*: the new prediction must stay
//     within (1 - threshold) x label_range of the previous
//     candidate for the same sample. A model that keeps
//     changing its mind about a sample is not confident.
//
// The store is keyed by the sample's row index, which the
// batcher carries through unchanged, so a pseudo-label sticks
// to its sample across epochs and shuffles. An admitted label
// stays in place until a later confident prediction replaces
// it.
//
// Reference: Rust Book §8 (HashMaps),
//            Sohn et al. (2020) "FixMatch"

use std::collections::HashMap;

/// Which admission rule the store applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PseudoTask {
    /// Scalar regression; `label_range` scales the stability
    /// tolerance (computed from the labeled training labels).
    Regression { label_range: f32 },

    /// Paired-logit classification (output_dim = 2 x label_dim).
    Classification,
}

/// Pseudo-labels for unlabeled training samples, keyed by row index.
pub struct PseudoLabelStore {
    task:            PseudoTask,
    threshold:       f64,
    update_interval: usize,

    /// Admitted labels, in the same shape as ground-truth labels
    labels: HashMap<usize, Vec<f32>>,

    /// Most recent prediction per sample, admitted or not.
    /// The regression stability rule compares against this.
    candidates: HashMap<usize, Vec<f32>>,
}

impl PseudoLabelStore {
    pub fn new(task: PseudoTask, threshold: f64, update_interval: usize) -> Self {
        Self {
            task,
            threshold,
            update_interval,
            labels:     HashMap::new(),
            candidates: HashMap::new(),
        }
    }

    /// Is a refresh due at this optimiser iteration?
    /// Iterations count from 1; a zero interval disables refreshes.
    pub fn due(&self, iteration: usize) -> bool {
        self.update_interval > 0 && iteration > 0 && iteration % self.update_interval == 0
    }

    /// Offer the model's prediction for one unlabeled sample.
    /// Returns true when the prediction was admitted as a label.
    pub fn offer(&mut self, index: usize, prediction: &[f32]) -> bool {
        let admitted = match self.task {
            PseudoTask::Classification => self.offer_classification(index, prediction),
            PseudoTask::Regression { label_range } => {
                self.offer_regression(index, prediction, label_range)
            }
        };
        // The candidate always tracks the latest prediction
        self.candidates.insert(index, prediction.to_vec());
        admitted
    }

    fn offer_classification(&mut self, index: usize, logits: &[f32]) -> bool {
        // Confidence = the WEAKEST pair decides
        let mut confidence = f32::INFINITY;
        let mut label = Vec::with_capacity(logits.len() / 2);
        for pair in logits.chunks_exact(2) {
            let (prob, class) = pair_max_softmax(pair[0], pair[1]);
            confidence = confidence.min(prob);
            label.push(class);
        }

        if label.is_empty() || f64::from(confidence) < self.threshold {
            return false;
        }
        self.labels.insert(index, label);
        true
    }

    fn offer_regression(&mut self, index: usize, prediction: &[f32], label_range: f32) -> bool {
        // First sighting: nothing to compare against yet
        let Some(previous) = self.candidates.get(&index) else {
            return false;
        };
        if previous.len() != prediction.len() {
            return false;
        }

        let drift = prediction
            .iter()
            .zip(previous)
            .map(|(now, then)| (now - then).abs())
            .fold(0.0_f32, f32::max);
        let tolerance = (1.0 - self.threshold) as f32 * label_range;

        if drift > tolerance {
            return false;
        }
        self.labels.insert(index, prediction.to_vec());
        true
    }

    /// The admitted pseudo-label for a sample, if any.
    pub fn label(&self, index: usize) -> Option<&[f32]> {
        self.labels.get(&index).map(Vec::as_slice)
    }

    /// How many samples currently hold an admitted pseudo-label.
    pub fn admitted(&self) -> usize {
        self.labels.len()
    }
}

/// Softmax over a two-logit pair, returning (max probability,
/// argmax class as f32). Shifted by the max logit so the
/// exponentials never overflow.
fn pair_max_softmax(a: f32, b: f32) -> (f32, f32) {
    let m = a.max(b);
    let ea = (a - m).exp();
    let eb = (b - m).exp();
    let pa = ea / (ea + eb);
    if pa >= 0.5 {
        (pa, 0.0)
    } else {
        (1.0 - pa, 1.0)
    }
}

/// Spread of the labeled training labels, used to scale the
/// regression stability tolerance. Degenerate inputs (empty or
/// constant) fall back to 1.0 so the tolerance stays positive.
pub fn label_range_from(values: &[f32]) -> f32 {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if !min.is_finite() || !max.is_finite() || max <= min {
        1.0
    } else {
        max - min
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_schedule() {
        let store = PseudoLabelStore::new(PseudoTask::Classification, 0.95, 100);
        assert!(!store.due(0));
        assert!(!store.due(50));
        assert!(store.due(100));
        assert!(!store.due(101));
        assert!(store.due(200));
    }

    #[test]
    fn test_confident_classification_is_admitted() {
        let mut store = PseudoLabelStore::new(PseudoTask::Classification, 0.95, 100);
        // Both pairs strongly favour class 0 / class 1
        assert!(store.offer(3, &[5.0, -5.0, -4.0, 4.0]));
        assert_eq!(store.label(3), Some(&[0.0, 1.0][..]));
        assert_eq!(store.admitted(), 1);
    }

    #[test]
    fn test_one_uncertain_pair_blocks_the_sample() {
        let mut store = PseudoLabelStore::new(PseudoTask::Classification, 0.95, 100);
        // First pair confident, second pair near 50/50
        assert!(!store.offer(3, &[5.0, -5.0, 0.1, -0.1]));
        assert_eq!(store.label(3), None);
        assert_eq!(store.admitted(), 0);
    }

    #[test]
    fn test_regression_needs_a_stable_repeat() {
        // threshold 0.95, range 4.0 → tolerance 0.2
        let mut store =
            PseudoLabelStore::new(PseudoTask::Regression { label_range: 4.0 }, 0.95, 100);

        // First sighting never admits
        assert!(!store.offer(7, &[1.0]));
        // Within tolerance of the previous candidate → admitted
        assert!(store.offer(7, &[1.1]));
        assert_eq!(store.label(7), Some(&[1.1][..]));

        // A jump outside tolerance is rejected, the old label stays
        assert!(!store.offer(7, &[2.0]));
        assert_eq!(store.label(7), Some(&[1.1][..]));

        // ... but the candidate moved, so a stable repeat near the
        // new value is admitted again
        assert!(store.offer(7, &[2.05]));
        assert_eq!(store.label(7), Some(&[2.05][..]));
    }

    #[test]
    fn test_label_range_fallback() {
        assert_eq!(label_range_from(&[-3.0, 0.5, 2.0]), 5.0);
        assert_eq!(label_range_from(&[]), 1.0);
        assert_eq!(label_range_from(&[0.7, 0.7]), 1.0);
    }
}
