//! Verifier configuration.

use serde::{Deserialize, Serialize};

use crate::models::Severity;

/// Configuration for the tiered verifier.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VerificationConfig {
    /// Similarity at which Tier 3 accepts a unique semantic candidate. Default: 0.85.
    pub semantic_verify_threshold: Option<f64>,
    /// Fraction of signature parameters allowed to differ before Tier 2 reports drift. Default: 0.0.
    pub signature_tolerance: Option<f64>,
    /// An `uncertain` verdict at or above this confidence stops the ladder. Default: 0.5.
    pub uncertain_terminal_confidence: Option<f64>,
    /// Lowest severity reported as a visible finding. Default: low.
    pub min_severity: Option<Severity>,
}

impl VerificationConfig {
    pub fn effective_semantic_verify_threshold(&self) -> f64 {
        self.semantic_verify_threshold.unwrap_or(0.85)
    }

    pub fn effective_signature_tolerance(&self) -> f64 {
        self.signature_tolerance.unwrap_or(0.0)
    }

    pub fn effective_uncertain_terminal_confidence(&self) -> f64 {
        self.uncertain_terminal_confidence.unwrap_or(0.5)
    }

    pub fn effective_min_severity(&self) -> Severity {
        self.min_severity.unwrap_or(Severity::Low)
    }
}
