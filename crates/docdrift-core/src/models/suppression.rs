//! Suppression rules hide matching drift findings from reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::claim::ClaimType;
use super::string_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionScope {
    Claim,
    File,
    ClaimType,
    Pattern,
}

string_enum!(SuppressionScope {
    Claim => "claim",
    File => "file",
    ClaimType => "claim_type",
    Pattern => "pattern",
});

/// Who created a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    QuickPick,
    CountBased,
    AgentInterpreted,
    Manual,
}

string_enum!(RuleSource {
    QuickPick => "quick_pick",
    CountBased => "count_based",
    AgentInterpreted => "agent_interpreted",
    Manual => "manual",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionRule {
    pub id: String,
    pub repo_id: String,
    pub scope: SuppressionScope,
    #[serde(default)]
    pub target_claim_id: Option<String>,
    #[serde(default)]
    pub target_file: Option<String>,
    #[serde(default)]
    pub target_claim_type: Option<ClaimType>,
    /// Regex matched against the claim text for `Pattern` scope.
    #[serde(default)]
    pub target_pattern: Option<String>,
    pub reason: String,
    pub source: RuleSource,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl SuppressionRule {
    /// Not revoked and not past its expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at.map_or(true, |exp| exp > now)
    }
}
