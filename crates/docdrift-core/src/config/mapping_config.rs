//! Mapper configuration.

use serde::{Deserialize, Serialize};

use crate::models::MappingWeights;

/// Configuration for claim-to-code mapping.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MappingConfig {
    /// Minimum cosine similarity for a semantic candidate. Default: 0.7.
    pub semantic_threshold: Option<f64>,
    /// Number of nearest entities considered by semantic search. Default: 5.
    pub semantic_top_k: Option<usize>,
    /// Cap on the co-change boost. Default: 0.2.
    pub co_change_max_boost: Option<f64>,
    /// Co-edit count at which the boost reaches ~63% of its cap. Default: 5.0.
    pub co_change_saturation: Option<f64>,
    /// Weight of the primary strategy confidence when ranking. Default: 1.0.
    pub confidence_weight: Option<f64>,
    /// Weight of the co-change boost when ranking. Default: 1.0.
    pub co_change_weight: Option<f64>,
}

impl MappingConfig {
    pub fn effective_semantic_threshold(&self) -> f64 {
        self.semantic_threshold.unwrap_or(0.7)
    }

    pub fn effective_semantic_top_k(&self) -> usize {
        self.semantic_top_k.unwrap_or(5)
    }

    pub fn effective_co_change_max_boost(&self) -> f64 {
        self.co_change_max_boost.unwrap_or(0.2)
    }

    pub fn effective_co_change_saturation(&self) -> f64 {
        self.co_change_saturation.unwrap_or(5.0)
    }

    pub fn effective_confidence_weight(&self) -> f64 {
        self.confidence_weight.unwrap_or(1.0)
    }

    pub fn effective_co_change_weight(&self) -> f64 {
        self.co_change_weight.unwrap_or(1.0)
    }

    pub fn weights(&self) -> MappingWeights {
        MappingWeights {
            confidence: self.effective_confidence_weight(),
            co_change: self.effective_co_change_weight(),
        }
    }
}
