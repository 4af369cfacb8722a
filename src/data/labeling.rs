// ============================================================
// Layer 4 — Labeled-Ratio Masking
// ============================================================
// Semi-supervised training pretends that only a fraction of
// the training set is labeled. This module erases the label
// bit on the remaining samples:
//
//   - keep a `labeled_ratio` fraction of samples labeled
//   - mark every other sample unlabeled (label kept on the
//     struct but ignored by the trainer — only pseudo-labels
//     may stand in for it)
//
// Which samples stay labeled is chosen by shuffling indices
// with a seeded RNG, so the same seed always selects the same
// labeled subset — runs are reproducible and resumable.
//
// Only the train split goes through this step; validation and
// test splits always keep all their labels.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom
// which is the standard unbiased shuffle algorithm.
//
// Reference: rand crate documentation
//            Rust Book §8 (Vectors)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::sample::MultimodalSample;

/// Keep a `ratio` fraction of `samples` labeled and mark the
/// rest unlabeled, deterministically for a given seed.
///
/// The sample order is untouched — only the `labeled` bits
/// change. Returns the number of samples left labeled.
pub fn apply_labeled_ratio(samples: &mut [MultimodalSample], ratio: f64, seed: u64) -> usize {
    let total = samples.len();

    // Round like the original pipeline: 0.5 of 5 keeps 3 labeled
    let keep = ((total as f64) * ratio.clamp(0.0, 1.0)).round() as usize;
    let keep = keep.min(total);

    // Shuffle index positions, not the samples themselves,
    // so batch order stays equal to file order
    let mut order: Vec<usize> = (0..total).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    for (rank, &idx) in order.iter().enumerate() {
        samples[idx].labeled = rank < keep;
    }

    tracing::info!(
        "Labeled-ratio masking: {} of {} train samples keep their label ({:.0}%)",
        keep,
        total,
        ratio * 100.0,
    );

    keep
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::SegmentMeta;

    fn samples(n: usize) -> Vec<MultimodalSample> {
        (0..n)
            .map(|index| MultimodalSample {
                index,
                text:    vec![vec![0.0; 2]; 2],
                audio:   vec![vec![0.0; 2]; 2],
                vision:  vec![vec![0.0; 2]; 2],
                label:   vec![0.0],
                meta:    SegmentMeta::new(format!("s[{index}]"), 0.0, 1.0),
                labeled: true,
            })
            .collect()
    }

    #[test]
    fn test_keeps_the_requested_fraction() {
        let mut s = samples(100);
        let kept = apply_labeled_ratio(&mut s, 0.5, 1111);
        assert_eq!(kept, 50);
        assert_eq!(s.iter().filter(|x| x.labeled).count(), 50);
    }

    #[test]
    fn test_rounds_to_nearest_sample() {
        let mut s = samples(5);
        // 5 * 0.5 = 2.5 → rounds to 3
        assert_eq!(apply_labeled_ratio(&mut s, 0.5, 1), 3);
    }

    #[test]
    fn test_same_seed_selects_same_subset() {
        let mut a = samples(40);
        let mut b = samples(40);
        apply_labeled_ratio(&mut a, 0.3, 1111);
        apply_labeled_ratio(&mut b, 0.3, 1111);
        let mask_a: Vec<bool> = a.iter().map(|s| s.labeled).collect();
        let mask_b: Vec<bool> = b.iter().map(|s| s.labeled).collect();
        assert_eq!(mask_a, mask_b);
    }

    #[test]
    fn test_different_seed_selects_different_subset() {
        let mut a = samples(40);
        let mut b = samples(40);
        apply_labeled_ratio(&mut a, 0.3, 1111);
        apply_labeled_ratio(&mut b, 0.3, 2222);
        let mask_a: Vec<bool> = a.iter().map(|s| s.labeled).collect();
        let mask_b: Vec<bool> = b.iter().map(|s| s.labeled).collect();
        assert_ne!(mask_a, mask_b);
    }

    #[test]
    fn test_ratio_bounds() {
        let mut s = samples(10);
        assert_eq!(apply_labeled_ratio(&mut s, 1.0, 1), 10);
        assert!(s.iter().all(|x| x.labeled));

        assert_eq!(apply_labeled_ratio(&mut s, 0.0, 1), 0);
        assert!(s.iter().all(|x| !x.labeled));
    }

    #[test]
    fn test_order_is_untouched() {
        let mut s = samples(10);
        apply_labeled_ratio(&mut s, 0.5, 7);
        let indices: Vec<usize> = s.iter().map(|x| x.index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }
}
