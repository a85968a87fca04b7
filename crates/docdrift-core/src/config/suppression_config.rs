//! Suppression & feedback configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SuppressionConfig {
    /// Negative feedback events on one claim before a claim rule is generated. Default: 2.
    pub claim_dismissal_threshold: Option<u32>,
    /// Distinct dismissed claims of one type before a claim_type rule is generated. Default: 5.
    pub claim_type_dismissal_threshold: Option<u32>,
    /// Lifetime of count-based rules in days. Default: 90.
    pub count_based_expiry_days: Option<i64>,
}

impl SuppressionConfig {
    pub fn effective_claim_dismissal_threshold(&self) -> u32 {
        self.claim_dismissal_threshold.unwrap_or(2)
    }

    pub fn effective_claim_type_dismissal_threshold(&self) -> u32 {
        self.claim_type_dismissal_threshold.unwrap_or(5)
    }

    pub fn effective_count_based_expiry_days(&self) -> i64 {
        self.count_based_expiry_days.unwrap_or(90)
    }
}
