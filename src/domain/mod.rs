// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// This is the heart of the application — pure Rust structs
// and traits that define the core concepts of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - NO ML-specific code
//   - Only plain Rust structs, enums, and traits
//
// Why keep this layer pure?
//   - Easy to unit test (no GPU needed)
//   - Easy to understand (no framework noise)
//   - Easy to swap implementations (just implement the trait)
//
// Think of this layer as the "dictionary" of the system —
// it defines what things ARE, not how they work.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// One multimodal sample, its metadata, and the split names
pub mod sample;

// The three modalities and the exclusivity-flag resolution
pub mod modality;

// Dataset identifiers with their output-dim / criterion tables
pub mod dataset_kind;

// Architecture and optimiser name validation
pub mod model_kind;

// Core abstractions (traits) that other layers implement
pub mod traits;
