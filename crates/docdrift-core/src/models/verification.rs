//! Verification outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::string_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Verified,
    Drifted,
    Uncertain,
}

string_enum!(Verdict {
    Verified => "verified",
    Drifted => "drifted",
    Uncertain => "uncertain",
});

/// Verification tier that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    Deterministic = 1,
    Structural = 2,
    Semantic = 3,
    Agent = 4,
}

impl Tier {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.as_u8()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Deterministic),
            2 => Ok(Self::Structural),
            3 => Ok(Self::Semantic),
            4 => Ok(Self::Agent),
            other => Err(format!("unknown verification tier {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

string_enum!(Severity {
    Low => "low",
    Medium => "medium",
    High => "high",
});

impl Severity {
    /// One level down, saturating at `Low`.
    pub fn lowered(self) -> Self {
        match self {
            Self::High => Self::Medium,
            Self::Medium | Self::Low => Self::Low,
        }
    }
}

/// The route through the verification ladder that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPath {
    Deterministic,
    Structural,
    Semantic,
    /// Agent verification with pre-gathered evidence.
    AgentEvidence,
    /// Agent verification exploring the repo on its own.
    AgentExploration,
    /// Capped to uncertain because the candidate set was ambiguous.
    Ambiguity,
    /// No tier could decide and the agent tier was unavailable.
    Exhausted,
    PostCheck,
}

string_enum!(VerificationPath {
    Deterministic => "deterministic",
    Structural => "structural",
    Semantic => "semantic",
    AgentEvidence => "agent_evidence",
    AgentExploration => "agent_exploration",
    Ambiguity => "ambiguity",
    Exhausted => "exhausted",
    PostCheck => "post_check",
});

/// A single verification outcome for a claim within a scan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub id: String,
    pub claim_id: String,
    pub repo_id: String,
    pub scan_run_id: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub tier: Tier,
    /// Present only on drifted results.
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub specific_mismatch: Option<String>,
    #[serde(default)]
    pub suggested_fix: Option<String>,
    #[serde(default)]
    pub evidence_files: Vec<String>,
    #[serde(default)]
    pub token_cost: Option<u64>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    pub verification_path: VerificationPath,
    #[serde(default)]
    pub suppressed: bool,
    #[serde(default)]
    pub suppression_rule_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VerificationResult {
    pub fn is_drifted(&self) -> bool {
        self.verdict == Verdict::Drifted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Tier::Structural).unwrap(), "2");
        let t: Tier = serde_json::from_str("4").unwrap();
        assert_eq!(t, Tier::Agent);
        assert!(serde_json::from_str::<Tier>("7").is_err());
    }

    #[test]
    fn severity_orders_low_to_high() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert_eq!(Severity::High.lowered(), Severity::Medium);
        assert_eq!(Severity::Low.lowered(), Severity::Low);
    }
}
