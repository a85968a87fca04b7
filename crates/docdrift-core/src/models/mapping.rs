//! Claim to code mappings and the ranked candidate set produced by the mapper.

use serde::{Deserialize, Serialize};

use super::string_enum;
use crate::constants::TIE_EPSILON;

/// Strategy that produced a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMethod {
    DirectReference,
    SymbolSearch,
    SemanticSearch,
    LlmAssisted,
    Manual,
    /// Reserved for history-only links; the co-change signal is applied as a boost.
    CoChange,
}

string_enum!(MappingMethod {
    DirectReference => "direct_reference",
    SymbolSearch => "symbol_search",
    SemanticSearch => "semantic_search",
    LlmAssisted => "llm_assisted",
    Manual => "manual",
    CoChange => "co_change",
});

impl MappingMethod {
    /// Strategy strength used to order candidates with equal scores.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Manual => 5,
            Self::DirectReference => 4,
            Self::SymbolSearch => 3,
            Self::SemanticSearch => 2,
            Self::LlmAssisted => 1,
            Self::CoChange => 0,
        }
    }
}

/// Resolution state of a claim's candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    /// No candidates at all.
    Unmapped,
    /// A single best candidate exists.
    Resolved,
    /// A referenced path matched several files by suffix.
    AmbiguousSuffixMatch,
    /// Two or more files are indistinguishable at the top of the ranking.
    AmbiguousTie,
}

string_enum!(MappingStatus {
    Unmapped => "unmapped",
    Resolved => "resolved",
    AmbiguousSuffixMatch => "ambiguous_suffix_match",
    AmbiguousTie => "ambiguous_tie",
});

impl MappingStatus {
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::AmbiguousSuffixMatch | Self::AmbiguousTie)
    }
}

/// Weights used to blend mapping confidence with the co-change boost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingWeights {
    pub confidence: f64,
    pub co_change: f64,
}

impl Default for MappingWeights {
    fn default() -> Self {
        Self {
            confidence: 1.0,
            co_change: 1.0,
        }
    }
}

/// A candidate linkage between a claim and code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimMapping {
    pub claim_id: String,
    pub code_file: String,
    #[serde(default)]
    pub code_entity_id: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub co_change_boost: f64,
    pub mapping_method: MappingMethod,
}

impl ClaimMapping {
    pub fn new(
        claim_id: impl Into<String>,
        code_file: impl Into<String>,
        confidence: f64,
        mapping_method: MappingMethod,
    ) -> Self {
        Self {
            claim_id: claim_id.into(),
            code_file: code_file.into(),
            code_entity_id: None,
            confidence: confidence.clamp(0.0, 1.0),
            co_change_boost: 0.0,
            mapping_method,
        }
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.code_entity_id = Some(entity_id.into());
        self
    }

    /// Ranking score: `clamp(w_c * confidence + w_b * boost, 0, 1)`.
    pub fn effective_confidence(&self, weights: MappingWeights) -> f64 {
        (weights.confidence * self.confidence + weights.co_change * self.co_change_boost)
            .clamp(0.0, 1.0)
    }

    /// Whether `other` is indistinguishable from `self` for ranking: same
    /// effective confidence, same raw confidence and same strategy strength.
    pub fn ties_with(&self, other: &ClaimMapping, weights: MappingWeights) -> bool {
        (self.effective_confidence(weights) - other.effective_confidence(weights)).abs() <= TIE_EPSILON
            && (self.confidence - other.confidence).abs() <= TIE_EPSILON
            && self.mapping_method.precedence() == other.mapping_method.precedence()
    }

    /// Dedup key: one mapping per (file, entity).
    pub fn key(&self) -> (&str, Option<&str>) {
        (self.code_file.as_str(), self.code_entity_id.as_deref())
    }
}

/// Ranked mappings for one claim, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub claim_id: String,
    pub mappings: Vec<ClaimMapping>,
    pub status: MappingStatus,
    /// Set when a manual mapping overrides all strategies.
    #[serde(default)]
    pub pinned: bool,
    /// Agent task enqueued by the mapper for this claim, if any.
    #[serde(default)]
    pub pending_agent_task: Option<String>,
}

impl CandidateSet {
    pub fn unmapped(claim_id: impl Into<String>) -> Self {
        Self {
            claim_id: claim_id.into(),
            mappings: Vec::new(),
            status: MappingStatus::Unmapped,
            pinned: false,
            pending_agent_task: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn is_ambiguous(&self) -> bool {
        self.status.is_ambiguous()
    }

    pub fn top(&self) -> Option<&ClaimMapping> {
        self.mappings.first()
    }

    /// Mappings tied with the top one under `weights`.
    pub fn top_tied(&self, weights: MappingWeights) -> Vec<&ClaimMapping> {
        let Some(best) = self.top() else {
            return Vec::new();
        };
        self.mappings
            .iter()
            .take_while(|m| best.ties_with(m, weights))
            .collect()
    }

    /// Distinct code files in rank order.
    pub fn files(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for m in &self.mappings {
            if !seen.contains(&m.code_file.as_str()) {
                seen.push(m.code_file.as_str());
            }
        }
        seen
    }
}
