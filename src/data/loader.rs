// ============================================================
// Layer 4 — Split Loader
// ============================================================
// Loads one dataset split from a JSON Lines feature file.
//
// File layout on disk:
//   <data_path>/<dataset>/train.jsonl
//   <data_path>/<dataset>/valid.jsonl
//   <data_path>/<dataset>/test.jsonl
// or, for the unaligned variant of the same dataset:
//   <data_path>/<dataset>/train_noalign.jsonl   (etc.)
//
// One JSON object per line, one line per segment:
//   {"segment": "c5xsKMxpXnc[3]", "start": 7.2, "end": 10.9,
//    "text":   [[...], ...],   // text_len   rows of text_dim
//    "audio":  [[...], ...],   // audio_len  rows of audio_dim
//    "vision": [[...], ...],   // vision_len rows of vision_dim
//    "label":  [0.6]}
//
// Every row is validated as it is read: all three feature
// matrices must be non-empty and rectangular, and every row
// of the split must have the same shapes and label length as
// the first row. A shape that silently differed here would
// otherwise only explode much later inside the model, so the
// loader fails fast with the offending line number instead.
//
// Reference: Rust Book §9 (Error Handling)
//            serde_json crate documentation

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use crate::domain::sample::{MultimodalSample, SegmentMeta, Split};
use crate::domain::traits::SampleSource;

/// One line of a split file as it appears on disk.
/// The labeled/unlabeled mask is NOT stored in the file —
/// it is derived later from the labeled ratio (Layer 4,
/// labeling module), so the same file serves every ratio.
#[derive(Debug, Deserialize)]
struct FeatureRow {
    segment: String,
    start:   f64,
    end:     f64,
    text:    Vec<Vec<f32>>,
    audio:   Vec<Vec<f32>>,
    vision:  Vec<Vec<f32>>,
    label:   Vec<f32>,
}

/// Loads the three splits of one named dataset.
/// Implements the SampleSource trait from Layer 3.
pub struct JsonlSplitLoader {
    /// Root directory holding one subdirectory per dataset
    data_path: PathBuf,

    /// Normalised dataset name (subdirectory name)
    dataset: String,

    /// Aligned features (true) or the _noalign variant (false)
    aligned: bool,
}

impl JsonlSplitLoader {
    pub fn new(data_path: impl Into<PathBuf>, dataset: impl Into<String>, aligned: bool) -> Self {
        Self {
            data_path: data_path.into(),
            dataset:   dataset.into(),
            aligned,
        }
    }

    /// Full path of one split file, picking the aligned or
    /// unaligned variant.
    fn split_path(&self, split: Split) -> PathBuf {
        let file = if self.aligned {
            format!("{split}.jsonl")
        } else {
            format!("{split}_noalign.jsonl")
        };
        self.data_path.join(&self.dataset).join(file)
    }
}

/// Implement the SampleSource trait so the application layer
/// can call load_split() without knowing about JSONL internals
impl SampleSource for JsonlSplitLoader {
    fn load_split(&self, split: Split) -> Result<Vec<MultimodalSample>> {
        let path = self.split_path(split);

        let file = File::open(&path).with_context(|| {
            format!(
                "cannot open split file '{}' for dataset '{}'",
                path.display(),
                self.dataset
            )
        })?;

        let reader      = BufReader::new(file);
        let mut samples = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line
                .with_context(|| format!("cannot read '{}' line {}", path.display(), line_no + 1))?;

            // Blank trailing lines are tolerated, anything else must parse
            if line.trim().is_empty() {
                continue;
            }

            let row: FeatureRow = serde_json::from_str(&line).with_context(|| {
                format!("malformed sample in '{}' line {}", path.display(), line_no + 1)
            })?;

            let sample = validate_row(row, samples.len(), samples.first()).with_context(|| {
                format!("invalid sample in '{}' line {}", path.display(), line_no + 1)
            })?;

            samples.push(sample);
        }

        if samples.is_empty() {
            bail!("split file '{}' contains no samples", path.display());
        }

        tracing::info!(
            "Loaded {} {} samples from '{}'",
            samples.len(),
            split,
            path.display()
        );
        Ok(samples)
    }
}

/// Check one parsed row and turn it into a sample.
///
/// `first` is the already-accepted first sample of the split,
/// if any — every later row must match its shapes exactly.
/// Samples come out of the loader fully labeled; the
/// labeled-ratio step may flip the bit for the train split.
fn validate_row(
    row:   FeatureRow,
    index: usize,
    first: Option<&MultimodalSample>,
) -> Result<MultimodalSample> {
    check_matrix("text",   &row.text)?;
    check_matrix("audio",  &row.audio)?;
    check_matrix("vision", &row.vision)?;

    if row.label.is_empty() {
        bail!("label vector is empty");
    }

    let sample = MultimodalSample {
        index,
        text:    row.text,
        audio:   row.audio,
        vision:  row.vision,
        label:   row.label,
        meta:    SegmentMeta::new(row.segment, row.start, row.end),
        labeled: true,
    };

    if let Some(first) = first {
        if sample.seq_lens() != first.seq_lens() {
            bail!(
                "sequence lengths {:?} differ from the split's first sample {:?}",
                sample.seq_lens(),
                first.seq_lens()
            );
        }
        if sample.feature_dims() != first.feature_dims() {
            bail!(
                "feature dims {:?} differ from the split's first sample {:?}",
                sample.feature_dims(),
                first.feature_dims()
            );
        }
        if sample.label.len() != first.label.len() {
            bail!(
                "label length {} differs from the split's first sample {}",
                sample.label.len(),
                first.label.len()
            );
        }
    }

    Ok(sample)
}

/// A feature matrix must have at least one timestep and the
/// same dimensionality on every timestep.
fn check_matrix(name: &str, rows: &[Vec<f32>]) -> Result<()> {
    let Some(head) = rows.first() else {
        bail!("{name} features are empty");
    };
    if head.is_empty() {
        bail!("{name} features have zero dimensionality");
    }
    if let Some(bad) = rows.iter().position(|r| r.len() != head.len()) {
        bail!(
            "{name} features are ragged: timestep {} has {} dims, expected {}",
            bad,
            rows[bad].len(),
            head.len()
        );
    }
    Ok(())
}
