// ============================================================
// Layer 3 — Modality Selection
// ============================================================
// The model fuses three modalities (text, audio, vision) by
// default. Three CLI flags — --lonly, --aonly, --vonly — can
// restrict the crossmodal fusion to a single target modality
// instead ("l" is the historical shorthand for language).
//
// The rules, checked BEFORE any data is loaded:
//   - no flag set    → tri-modal fusion, all three targets active
//   - one flag set   → only that target branch is built
//   - two or more    → fatal validation error
//
// Reference: Rust Book §6 (Enums and Pattern Matching)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// One of the three feature streams describing a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Audio,
    Vision,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text   => "text",
            Modality::Audio  => "audio",
            Modality::Vision => "vision",
        }
    }
}

/// Which target branches of the crossmodal model are active.
/// Constructed only through `from_flags`, which enforces the
/// mutual-exclusivity rule — an invalid combination can never
/// be represented. Serde derives exist so the selection can be
/// saved as part of the resolved hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalitySelection {
    pub text:   bool,
    pub audio:  bool,
    pub vision: bool,
}

impl ModalitySelection {
    /// Resolve the three exclusivity flags into a selection.
    ///
    /// Zero flags means full tri-modal fusion; exactly one
    /// flag selects that single branch; anything else is the
    /// one validation failure this program raises itself.
    pub fn from_flags(lonly: bool, aonly: bool, vonly: bool) -> Result<Self> {
        let set = [lonly, aonly, vonly].iter().filter(|&&f| f).count();

        match set {
            0 => Ok(Self { text: true, audio: true, vision: true }),
            1 => Ok(Self { text: lonly, audio: aonly, vision: vonly }),
            _ => bail!("at most one of the per-modality exclusivity flags may be set"),
        }
    }

    /// Number of active target branches (1 or 3).
    pub fn active_count(&self) -> usize {
        [self.text, self.audio, self.vision]
            .iter()
            .filter(|&&f| f)
            .count()
    }

    /// All three branches active?
    pub fn is_trimodal(&self) -> bool {
        self.text && self.audio && self.vision
    }

    /// The active modalities in canonical order.
    pub fn active(&self) -> Vec<Modality> {
        let mut out = Vec::new();
        if self.text   { out.push(Modality::Text); }
        if self.audio  { out.push(Modality::Audio); }
        if self.vision { out.push(Modality::Vision); }
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_selects_all_three() {
        let sel = ModalitySelection::from_flags(false, false, false).unwrap();
        assert!(sel.is_trimodal());
        assert_eq!(sel.active_count(), 3);
    }

    #[test]
    fn test_single_flag_selects_that_modality() {
        let sel = ModalitySelection::from_flags(true, false, false).unwrap();
        assert_eq!((sel.text, sel.audio, sel.vision), (true, false, false));

        let sel = ModalitySelection::from_flags(false, true, false).unwrap();
        assert_eq!((sel.text, sel.audio, sel.vision), (false, true, false));

        let sel = ModalitySelection::from_flags(false, false, true).unwrap();
        assert_eq!((sel.text, sel.audio, sel.vision), (false, false, true));
        assert_eq!(sel.active_count(), 1);
    }

    #[test]
    fn test_two_or_more_flags_is_an_error() {
        assert!(ModalitySelection::from_flags(true, true, false).is_err());
        assert!(ModalitySelection::from_flags(true, false, true).is_err());
        assert!(ModalitySelection::from_flags(false, true, true).is_err());
        assert!(ModalitySelection::from_flags(true, true, true).is_err());
    }

    #[test]
    fn test_active_order_is_text_audio_vision() {
        let sel = ModalitySelection::from_flags(false, false, false).unwrap();
        assert_eq!(
            sel.active(),
            vec![Modality::Text, Modality::Audio, Modality::Vision]
        );
    }
}
