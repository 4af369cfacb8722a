// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from feature files on disk
// all the way to device-ready tensor batches.
//
// The pipeline flows in this order:
//
//   <dataset>/<split>.jsonl files
//       │
//       ▼
//   JsonlSplitLoader   → reads rows, validates shapes
//       │
//       ▼
//   apply_labeled_ratio → erases labels on a seeded fraction
//       │                 of the train split (semi-supervised)
//       ▼
//   MultimodalDataset  → implements Burn's Dataset trait,
//       │                exposes dims / sequence lengths
//       ▼
//   MultimodalBatcher  → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader         → feeds batches to the training loop
//
// Each module is responsible for exactly one step.
// This makes each step independently testable and replaceable.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Loads JSON Lines feature files with shape validation
pub mod loader;

/// Erases labels on a seeded fraction of the train split
pub mod labeling;

/// Implements Burn's Dataset trait for multimodal samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
