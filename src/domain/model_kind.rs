// ============================================================
// Layer 3 — Architecture and Optimiser Selectors
// ============================================================
// The --model and --optim flags name which architecture and
// optimiser to run. Both are validated up front: an unknown
// name fails at configuration time with the list of supported
// values, instead of surfacing later as a missing symbol deep
// inside the training loop.
//
// Model names are normalised trim + UPPERCASE ("mult", " MulT "
// and "MULT" all select the crossmodal transformer).
//
// Reference: Rust Book §6 (Enums and Pattern Matching)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Supported model architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Crossmodal transformer with per-branch attention stacks.
    Mult,
}

impl ModelKind {
    /// Trim + uppercase, mirroring the dataset-name rule.
    pub fn normalize_name(raw: &str) -> String {
        raw.trim().to_uppercase()
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match Self::normalize_name(raw).as_str() {
            "MULT" => Ok(ModelKind::Mult),
            other  => bail!("unknown model '{other}' (supported: MULT)"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Mult => "MULT",
        }
    }
}

/// Supported optimisers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimKind {
    Adam,
}

impl OptimKind {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "adam" => Ok(OptimKind::Adam),
            other  => bail!("unknown optimiser '{other}' (supported: Adam)"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OptimKind::Adam => "Adam",
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_is_normalized_uppercase() {
        assert_eq!(ModelKind::parse(" mult ").unwrap(), ModelKind::Mult);
        assert_eq!(ModelKind::parse("MulT").unwrap(),   ModelKind::Mult);
        assert_eq!(ModelKind::Mult.as_str(), "MULT");
    }

    #[test]
    fn test_model_normalization_is_idempotent() {
        let once  = ModelKind::normalize_name(" MulT ");
        let twice = ModelKind::normalize_name(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        assert!(ModelKind::parse("Transformer").is_err());
    }

    #[test]
    fn test_only_adam_is_accepted() {
        assert_eq!(OptimKind::parse("Adam").unwrap(), OptimKind::Adam);
        assert_eq!(OptimKind::parse("ADAM").unwrap(), OptimKind::Adam);
        assert!(OptimKind::parse("SGD").is_err());
    }
}
