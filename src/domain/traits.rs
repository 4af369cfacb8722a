// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Traits are Rust's way of defining shared behaviour —
// similar to interfaces in Java or abstract classes in Python.
//
// By programming against traits instead of concrete types,
// we can swap implementations without changing the code
// that uses them. For example:
//   - JsonlSplitLoader implements SampleSource
//   - A stub in-memory source implements it in tests
//   - The application layer only sees SampleSource
//     and works with both without any changes
//
// This is the Dependency Inversion Principle from SOLID,
// applied using Rust's trait system.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::sample::{MultimodalSample, Split};

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can produce the samples of one dataset
/// split, fully validated and in file order.
///
/// Implementations:
///   - JsonlSplitLoader → reads JSON Lines feature files
///   - test stubs       → hand-built sample vectors
pub trait SampleSource {
    /// Load every sample of the given split.
    /// Sample indices must equal their position in the
    /// returned vector.
    fn load_split(&self, split: Split) -> Result<Vec<MultimodalSample>>;
}
