// ============================================================
// Layer 3 — Dataset Kind and Criterion
// ============================================================
// Every supported dataset fixes two training parameters:
//   - output dimensionality of the model head
//   - which loss criterion drives optimisation
//
// Rather than a string-keyed dictionary lookup with a silent
// fallback, the mapping is an enum: each known dataset is a
// variant, and anything else lands in `Other` — an explicit,
// visible default branch (output 1, L1 criterion) instead of
// a typo silently training the wrong objective.
//
// Dataset names are normalised (trim + lowercase) before the
// lookup, so "  MOSEI_Senti " and "mosei_senti" are the same
// dataset. Normalisation is idempotent.
//
// Reference: Rust Book §6 (Enums and Pattern Matching)

use serde::{Deserialize, Serialize};

/// The loss criterion a dataset trains with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Mean absolute error over a regression target
    /// (sentiment score in [-3, 3]).
    L1,

    /// Per-emotion two-class cross entropy over paired logits.
    CrossEntropy,
}

impl Criterion {
    /// Display name, matching the conventional framework names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::L1           => "L1Loss",
            Criterion::CrossEntropy => "CrossEntropyLoss",
        }
    }
}

/// A dataset identifier with its fixed per-dataset parameters.
/// `Other` keeps the normalised name so file paths and logs
/// still refer to the dataset the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetKind {
    Mosi,
    MoseiSenti,
    Iemocap,
    Other(String),
}

impl DatasetKind {
    /// Trim + lowercase. Applying it twice returns the same
    /// string as applying it once.
    pub fn normalize_name(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    /// Parse a raw dataset name into its kind.
    /// Unknown names are not an error — they select the
    /// default parameters through the `Other` branch.
    pub fn parse(raw: &str) -> Self {
        let name = Self::normalize_name(raw);
        match name.as_str() {
            "mosi"        => DatasetKind::Mosi,
            "mosei_senti" => DatasetKind::MoseiSenti,
            "iemocap"     => DatasetKind::Iemocap,
            _             => DatasetKind::Other(name),
        }
    }

    /// The normalised dataset name (directory name on disk).
    pub fn name(&self) -> &str {
        match self {
            DatasetKind::Mosi          => "mosi",
            DatasetKind::MoseiSenti    => "mosei_senti",
            DatasetKind::Iemocap       => "iemocap",
            DatasetKind::Other(name)   => name,
        }
    }

    /// Output dimensionality of the model head.
    /// iemocap predicts 4 emotions x 2 classes = 8 logits;
    /// the sentiment datasets regress a single score.
    pub fn output_dim(&self) -> usize {
        match self {
            DatasetKind::Iemocap => 8,
            DatasetKind::Mosi
            | DatasetKind::MoseiSenti
            | DatasetKind::Other(_) => 1,
        }
    }

    /// The training criterion for this dataset.
    pub fn criterion(&self) -> Criterion {
        match self {
            DatasetKind::Iemocap => Criterion::CrossEntropy,
            DatasetKind::Mosi
            | DatasetKind::MoseiSenti
            | DatasetKind::Other(_) => Criterion::L1,
        }
    }
}
