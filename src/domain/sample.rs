// ============================================================
// Layer 3 — Multimodal Sample Domain Types
// ============================================================
// Represents one video segment of the sentiment corpus in
// domain terms. Every sample carries three parallel feature
// streams (modalities) that describe the same time window:
//   - text:   word embeddings,        [text_len  x text_dim]
//   - audio:  acoustic descriptors,   [audio_len x audio_dim]
//   - vision: facial action features, [vision_len x vision_dim]
//
// The features arrive pre-extracted — this repo never touches
// raw video or audio signal. A sample also carries its label
// vector, a metadata record identifying the source segment,
// and a `labeled` bit used by semi-supervised training:
// unlabeled samples keep their label on disk but the trainer
// must not look at it (only pseudo-labels may be used).
//
// All of this is plain Rust — no tensor types here. Tensors
// only appear once samples are batched (Layer 4).
//
// Reference: Rust Book §5 (Structs)

use serde::{Deserialize, Serialize};

/// Which partition of a dataset to load.
/// The three splits of one dataset must agree on feature
/// dimensionality and sequence length per modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    /// The split's name as it appears in dataset file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test  => "test",
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies where a sample came from in the source corpus.
/// Carried through batching untouched so predictions can be
/// traced back to the original video segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMeta {
    /// Source segment id, e.g. "c5xsKMxpXnc[3]"
    pub segment: String,

    /// Segment start time in seconds within the source video
    pub start: f64,

    /// Segment end time in seconds within the source video
    pub end: f64,
}

impl SegmentMeta {
    pub fn new(segment: impl Into<String>, start: f64, end: f64) -> Self {
        Self { segment: segment.into(), start, end }
    }
}

/// One fully loaded sample: three feature matrices, a label
/// vector, metadata and the labeled/unlabeled mask bit.
/// Immutable once produced by the loader — the only later
/// change is the `labeled` bit flipped by the labeled-ratio
/// masking step, before training starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultimodalSample {
    /// Row index within the split file (0-based line number).
    /// Used as the key for the pseudo-label store.
    pub index: usize,

    /// Text features, row-major: text[t][d], t < text_len
    pub text: Vec<Vec<f32>>,

    /// Audio features, row-major: audio[t][d], t < audio_len
    pub audio: Vec<Vec<f32>>,

    /// Vision features, row-major: vision[t][d], t < vision_len
    pub vision: Vec<Vec<f32>>,

    /// Label vector. Length 1 for regression datasets
    /// (sentiment score), one entry per emotion class index
    /// for classification datasets.
    pub label: Vec<f32>,

    /// Source segment identification
    pub meta: SegmentMeta,

    /// true → ground-truth label may be used by the trainer;
    /// false → sample participates only through pseudo-labels
    pub labeled: bool,
}

impl MultimodalSample {
    /// Sequence length per modality: (text, audio, vision)
    pub fn seq_lens(&self) -> (usize, usize, usize) {
        (self.text.len(), self.audio.len(), self.vision.len())
    }

    /// Feature dimensionality per modality: (text, audio, vision).
    /// Sequences are validated non-empty at load time, so
    /// indexing the first timestep is safe here.
    pub fn feature_dims(&self) -> (usize, usize, usize) {
        (self.text[0].len(), self.audio[0].len(), self.vision[0].len())
    }
}
