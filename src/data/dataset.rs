// ============================================================
// Layer 4 — Multimodal Dataset
// ============================================================
// Wraps the loaded samples of one split in Burn's Dataset
// trait so the DataLoader can call .get(index) and .len(),
// and exposes the shape facts (feature dims, sequence
// lengths, label width) that the hyperparameter resolver
// reads after loading.
//
// Also home of the cross-split agreement check: the three
// splits of one dataset must describe the same feature space,
// and that is verified once, right after loading.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use anyhow::{bail, Result};
use burn::data::dataset::Dataset;

use crate::domain::sample::MultimodalSample;

/// An in-memory dataset split exposing Burn's Dataset trait
/// plus the shape information the hyperparameter resolver
/// reads after loading: per-modality feature dimensionality
/// and sequence length.
///
/// Shapes are taken from the first sample; the loader has
/// already validated that every sample in the split agrees.
pub struct MultimodalDataset {
    samples: Vec<MultimodalSample>,
}

impl MultimodalDataset {
    pub fn new(samples: Vec<MultimodalSample>) -> Self {
        Self { samples }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// (text_dim, audio_dim, vision_dim)
    pub fn feature_dims(&self) -> (usize, usize, usize) {
        self.samples[0].feature_dims()
    }

    /// (text_len, audio_len, vision_len)
    pub fn seq_lens(&self) -> (usize, usize, usize) {
        self.samples[0].seq_lens()
    }

    /// How many samples still carry a usable ground-truth label.
    pub fn labeled_count(&self) -> usize {
        self.samples.iter().filter(|s| s.labeled).count()
    }

    /// Label vectors of the labeled samples, flattened.
    /// The trainer derives the observed label range from this.
    pub fn labeled_values(&self) -> Vec<f32> {
        self.samples
            .iter()
            .filter(|s| s.labeled)
            .flat_map(|s| s.label.iter().copied())
            .collect()
    }

    /// Label vector length (uniform across the split).
    pub fn label_dim(&self) -> usize {
        self.samples[0].label.len()
    }
}

impl Dataset<MultimodalSample> for MultimodalDataset {
    fn get(&self, index: usize) -> Option<MultimodalSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// The three splits of one dataset must describe the same
/// feature space: identical per-modality dimensionality,
/// sequence length and label length. Each split is internally
/// uniform already (the loader enforced that), so comparing
/// first samples compares whole splits. A silent mismatch
/// here would only surface as a shape error deep inside the
/// model, so it is checked once, right after loading.
pub fn validate_split_agreement(
    train: &[MultimodalSample],
    valid: &[MultimodalSample],
    test:  &[MultimodalSample],
) -> Result<()> {
    let Some(anchor) = train.first() else {
        bail!("train split is empty");
    };

    for (name, split) in [("valid", valid), ("test", test)] {
        let Some(first) = split.first() else {
            bail!("{name} split is empty");
        };
        if first.feature_dims() != anchor.feature_dims() {
            bail!(
                "{name} split feature dims {:?} do not match train {:?}",
                first.feature_dims(),
                anchor.feature_dims()
            );
        }
        if first.seq_lens() != anchor.seq_lens() {
            bail!(
                "{name} split sequence lengths {:?} do not match train {:?}",
                first.seq_lens(),
                anchor.seq_lens()
            );
        }
        if first.label.len() != anchor.label.len() {
            bail!(
                "{name} split label length {} does not match train {}",
                first.label.len(),
                anchor.label.len()
            );
        }
    }
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::SegmentMeta;

    fn sample(index: usize, text_dim: usize) -> MultimodalSample {
        MultimodalSample {
            index,
            text:    vec![vec![0.0; text_dim]; 3],
            audio:   vec![vec![0.0; 4]; 2],
            vision:  vec![vec![0.0; 5]; 2],
            label:   vec![0.0],
            meta:    SegmentMeta::new(format!("seg[{index}]"), 0.0, 1.0),
            labeled: index % 2 == 0,
        }
    }

    fn samples(n: usize, text_dim: usize) -> Vec<MultimodalSample> {
        (0..n).map(|i| sample(i, text_dim)).collect()
    }

    fn dataset(n: usize, text_dim: usize) -> MultimodalDataset {
        MultimodalDataset::new(samples(n, text_dim))
    }

    #[test]
    fn test_dataset_trait_roundtrip() {
        let ds = dataset(3, 2);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.get(1).unwrap().index, 1);
        assert!(ds.get(3).is_none());
    }

    #[test]
    fn test_shape_accessors() {
        let ds = dataset(2, 7);
        assert_eq!(ds.feature_dims(), (7, 4, 5));
        assert_eq!(ds.seq_lens(),     (3, 2, 2));
        assert_eq!(ds.label_dim(),    1);
    }

    #[test]
    fn test_labeled_count() {
        let ds = dataset(4, 2);
        // indices 0 and 2 are labeled in the fixture
        assert_eq!(ds.labeled_count(), 2);
        assert_eq!(ds.labeled_values().len(), 2);
    }

    #[test]
    fn test_split_agreement_accepts_matching_splits() {
        assert!(validate_split_agreement(&samples(4, 2), &samples(2, 2), &samples(2, 2)).is_ok());
    }

    #[test]
    fn test_split_agreement_rejects_dim_mismatch() {
        let err =
            validate_split_agreement(&samples(4, 2), &samples(2, 3), &samples(2, 2)).unwrap_err();
        assert!(err.to_string().contains("valid"));
    }

    #[test]
    fn test_split_agreement_rejects_empty_split() {
        assert!(validate_split_agreement(&samples(4, 2), &[], &samples(2, 2)).is_err());
    }
}
