// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL tensor and training code built on
// the Burn framework.
//
// Why isolate Burn-heavy code here?
//   - If Burn's API changes, the blast radius is this layer
//   - The architecture is clearly separated from data loading
//     and application orchestration
//   - Pure-logic pieces (pseudo-label admission, plateau decay,
//     metric formulas) stay testable without any device
//
// What's in this layer:
//
//   transformer.rs  — The crossmodal transformer encoder
//                     Pre-LN layers usable in self- or
//                     cross-attention mode, with:
//                     • √d input scaling + sinusoidal positions
//                     • Multi-head (cross-)attention
//                     • Rectangular causal future masks
//                     • Feed-forward blocks (ReLU, 4x width)
//
//   model.rs        — The MulT model
//                     1x1-conv modality projections, per-target
//                     crossmodal branches, self-attention memory
//                     stacks, residual projection head
//
//   pseudo_label.rs — The pseudo-label store
//                     Confidence-gated self-training labels for
//                     the unlabeled part of the train split
//
//   trainer.rs      — The semi-supervised training loop
//                     Masked supervised + pseudo-label loss,
//                     Adam with gradient clipping, plateau lr
//                     decay, best-checkpoint selection
//
//   evaluate.rs     — Host-side metrics
//                     MAE / correlation / bucketed accuracy /
//                     weighted F1 for sentiment, per-emotion
//                     scores for iemocap-style datasets
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Tsai et al. (2019) Multimodal Transformer

/// Pre-LN transformer encoder with self and cross modes
pub mod transformer;

/// MulT crossmodal model architecture
pub mod model;

/// Confidence-gated pseudo-label store
pub mod pseudo_label;

/// Full semi-supervised training loop
pub mod trainer;

/// Evaluation metrics and prediction collection
pub mod evaluate;
