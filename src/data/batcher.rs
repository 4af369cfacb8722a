// ============================================================
// Layer 4 — Multimodal Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a
// Vec<MultimodalSample> into device-ready tensors.
//
// What is a Batcher?
//   A Batcher takes a list of individual samples and stacks
//   them into a single batch tensor. This is necessary because
//   accelerators are most efficient when processing many
//   samples at once.
//
// How batching works here:
//   Input:  Vec of N MultimodalSamples
//   Output: MultimodalBatch with one [N, seq, dim] tensor per
//           modality, a [N, label_dim] label tensor and a [N]
//           labeled-mask tensor, all on the target device.
//
//   Per modality we flatten all timesteps of all samples into
//   one long Vec, then reshape:
//   [s1_t1_d1, ..., s1_tT_dD, s2_t1_d1, ...] → [N, T, D]
//
//   Row indices and segment metadata are NOT tensor material —
//   they stay as plain ordered Vecs on the host (indices key
//   the pseudo-label store, metadata is for traceability).
//
// Invariant: element order is identical across every per-field
// container and equal to the input order. No reordering, no
// filtering — sample k of the input is row k of every tensor.
//
// Why is the reshape safe here?
//   Because the loader already guarantees that every sample of
//   a split has identical sequence lengths and feature dims.
//
// Reference: Burn Book §4 (Batcher)
//            Rust Book §8 (Vectors)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::sample::{MultimodalSample, SegmentMeta};

// ─── MultimodalBatch ──────────────────────────────────────────────────────────
/// A batch of samples ready for the model forward pass.
/// All tensors have batch_size as their first dimension.
///
/// B is the Burn Backend (e.g. Wgpu, NdArray) —
/// generic so the same batcher works on any device.
#[derive(Debug, Clone)]
pub struct MultimodalBatch<B: Backend> {
    /// Row index of each sample — shape: [batch_size], host side.
    /// Keys the pseudo-label store during training.
    pub indices: Vec<usize>,

    /// Text features — shape: [batch_size, text_len, text_dim]
    pub text: Tensor<B, 3>,

    /// Audio features — shape: [batch_size, audio_len, audio_dim]
    pub audio: Tensor<B, 3>,

    /// Vision features — shape: [batch_size, vision_len, vision_dim]
    pub vision: Tensor<B, 3>,

    /// Ground truth labels — shape: [batch_size, label_dim]
    pub labels: Tensor<B, 2>,

    /// Segment metadata per sample, host side, input order
    pub metas: Vec<SegmentMeta>,

    /// Labeled mask — shape: [batch_size]
    /// 1.0 = ground truth usable, 0.0 = unlabeled sample
    pub mask: Tensor<B, 1>,
}

impl<B: Backend> MultimodalBatch<B> {
    /// Number of samples in this batch.
    pub fn size(&self) -> usize {
        self.indices.len()
    }
}

// ─── MultimodalBatcher ────────────────────────────────────────────────────────
/// The batcher struct — holds the target device so tensors
/// are created on the correct accelerator/CPU.
#[derive(Clone, Debug)]
pub struct MultimodalBatcher<B: Backend> {
    /// The device to create tensors on
    pub device: B::Device,
}

impl<B: Backend> MultimodalBatcher<B> {
    /// Create a new batcher for the given device
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Stack one modality across the batch:
    /// N matrices of [seq, dim] → one tensor [N, seq, dim].
    fn stack_modality(
        &self,
        items:  &[MultimodalSample],
        select: fn(&MultimodalSample) -> &Vec<Vec<f32>>,
    ) -> Tensor<B, 3> {
        let batch_size = items.len();
        let seq_len    = select(&items[0]).len();
        let dim        = select(&items[0])[0].len();

        let flat: Vec<f32> = items
            .iter()
            .flat_map(|s| select(s).iter().flatten().copied())
            .collect();

        Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len, dim])
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// This is what makes MultimodalBatcher work with Burn's
// DataLoader. The DataLoader calls .batch(items) with each
// mini-batch of samples.
impl<B: Backend> Batcher<MultimodalSample, MultimodalBatch<B>> for MultimodalBatcher<B> {
    /// Convert a Vec of samples into a single MultimodalBatch.
    ///
    /// Steps:
    ///   1. Stack text / audio / vision into [N, seq, dim] tensors
    ///   2. Stack labels into [N, label_dim]
    ///   3. Collect indices and metadata as plain Vecs
    ///   4. Turn the labeled bits into a [N] mask tensor
    fn batch(&self, items: Vec<MultimodalSample>) -> MultimodalBatch<B> {
        let batch_size = items.len();
        let label_dim  = items[0].label.len();

        let text   = self.stack_modality(&items, |s| &s.text);
        let audio  = self.stack_modality(&items, |s| &s.audio);
        let vision = self.stack_modality(&items, |s| &s.vision);

        let label_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.label.iter().copied())
            .collect();
        let labels = Tensor::<B, 1>::from_floats(label_flat.as_slice(), &self.device)
            .reshape([batch_size, label_dim]);

        let mask_flat: Vec<f32> = items
            .iter()
            .map(|s| if s.labeled { 1.0 } else { 0.0 })
            .collect();
        let mask = Tensor::<B, 1>::from_floats(mask_flat.as_slice(), &self.device);

        let indices: Vec<usize>     = items.iter().map(|s| s.index).collect();
        let metas: Vec<SegmentMeta> = items.iter().map(|s| s.meta.clone()).collect();

        MultimodalBatch {
            indices,
            text,
            audio,
            vision,
            labels,
            metas,
            mask,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn sample(index: usize, labeled: bool, label: f32) -> MultimodalSample {
        // Each feature value encodes the sample index so order
        // mix-ups would be visible in the stacked tensors
        let v = index as f32;
        MultimodalSample {
            index,
            text:    vec![vec![v, v + 0.1]; 3],
            audio:   vec![vec![v + 0.2]; 2],
            vision:  vec![vec![v + 0.3, v + 0.4, v + 0.5]; 4],
            label:   vec![label],
            meta:    SegmentMeta::new(format!("seg[{index}]"), index as f64, index as f64 + 1.0),
            labeled,
        }
    }

    fn batcher() -> MultimodalBatcher<TestBackend> {
        MultimodalBatcher::new(Default::default())
    }

    #[test]
    fn test_batch_preserves_order() {
        let batch = batcher().batch(vec![
            sample(4, true, 0.1),
            sample(0, false, 0.2),
            sample(9, true, 0.3),
        ]);

        assert_eq!(batch.indices, vec![4, 0, 9]);
        assert_eq!(batch.metas[0].segment, "seg[4]");
        assert_eq!(batch.metas[2].segment, "seg[9]");

        // Row k of the text tensor belongs to input sample k
        let text: Vec<f32> = batch.text.into_data().to_vec().unwrap();
        assert_eq!(text[0], 4.0); // first value of sample 4
        assert_eq!(text[6], 0.0); // first value of sample 0 (3 timesteps x 2 dims later)
        assert_eq!(text[12], 9.0);
    }

    #[test]
    fn test_batch_shapes_share_the_leading_dimension() {
        let batch = batcher().batch(vec![
            sample(0, true, 0.0),
            sample(1, true, 0.0),
            sample(2, true, 0.0),
        ]);

        assert_eq!(batch.size(), 3);
        assert_eq!(batch.text.dims(),   [3, 3, 2]);
        assert_eq!(batch.audio.dims(),  [3, 2, 1]);
        assert_eq!(batch.vision.dims(), [3, 4, 3]);
        assert_eq!(batch.labels.dims(), [3, 1]);
        assert_eq!(batch.mask.dims(),   [3]);
        assert_eq!(batch.indices.len(), 3);
        assert_eq!(batch.metas.len(),   3);
    }

    #[test]
    fn test_mask_follows_the_labeled_bit() {
        let batch = batcher().batch(vec![
            sample(0, true, 0.0),
            sample(1, false, 0.0),
            sample(2, true, 0.0),
        ]);

        let mask: Vec<f32> = batch.mask.into_data().to_vec().unwrap();
        assert_eq!(mask, vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_labels_are_stacked_in_order() {
        let batch = batcher().batch(vec![sample(0, true, -1.5), sample(1, true, 2.5)]);
        let labels: Vec<f32> = batch.labels.into_data().to_vec().unwrap();
        assert_eq!(labels, vec![-1.5, 2.5]);
    }
}
