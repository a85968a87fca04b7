//! Agent tasks: units of LLM work queued for external workers, plus their
//! typed payloads and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::claim::Claim;
use super::suppression::SuppressionScope;
use super::string_enum;
use super::verification::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTaskType {
    Verification,
    ClaimClassification,
    ClaimExtraction,
    FixGeneration,
    PostCheck,
    FeedbackInterpretation,
}

string_enum!(AgentTaskType {
    Verification => "verification",
    ClaimClassification => "claim_classification",
    ClaimExtraction => "claim_extraction",
    FixGeneration => "fix_generation",
    PostCheck => "post_check",
    FeedbackInterpretation => "feedback_interpretation",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Expired,
}

string_enum!(AgentTaskStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Failed => "failed",
    Expired => "expired",
});

impl AgentTaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A queued unit of agent work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: String,
    pub repo_id: String,
    pub scan_run_id: String,
    #[serde(default)]
    pub claim_id: Option<String>,
    pub task_type: AgentTaskType,
    pub status: AgentTaskStatus,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub claimed_by: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    /// Lease deadline while in progress; queue TTL while pending.
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl AgentTask {
    /// Decode the payload into its typed form.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Whether the agent works from supplied evidence or explores on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Evidence,
    Exploration,
}

/// A code excerpt handed to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceFile {
    pub path: String,
    #[serde(default)]
    pub entity_name: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationPayload {
    pub claim: Claim,
    pub mode: AgentMode,
    #[serde(default)]
    pub evidence: Vec<EvidenceFile>,
    /// Estimated token count of `evidence`.
    #[serde(default)]
    pub evidence_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationPayload {
    pub claim: Claim,
    pub candidate_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPayload {
    pub doc_file: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixGenerationPayload {
    pub claim: Claim,
    pub verification_result_id: String,
    #[serde(default)]
    pub specific_mismatch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCheckPayload {
    pub claim: Claim,
    pub verification_result_id: String,
    #[serde(default)]
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackInterpretationPayload {
    pub feedback_id: String,
    pub claim: Claim,
    pub free_text: String,
}

/// Agent result for a verification or post-check task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentVerdict {
    pub verdict: Verdict,
    #[serde(default)]
    pub confidence: Option<f64>,
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
}

/// Agent result for a claim-classification task: the files it judged relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub files: Vec<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixResult {
    pub suggested_fix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub claims: Vec<Claim>,
}

/// What the agent decided a free-text feedback comment means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InterpretedAction {
    NoAction,
    Suppress {
        scope: SuppressionScope,
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default)]
        expires_in_days: Option<i64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackInterpretation {
    pub action: InterpretedAction,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpretation_parses_tagged_action() {
        let json = serde_json::json!({
            "action": { "action": "suppress", "scope": "file", "expires_in_days": 30 },
            "reasoning": "roadmap doc"
        });
        let parsed: FeedbackInterpretation = serde_json::from_value(json).unwrap();
        assert_eq!(
            parsed.action,
            InterpretedAction::Suppress {
                scope: SuppressionScope::File,
                pattern: None,
                expires_in_days: Some(30),
            }
        );
    }

    #[test]
    fn terminal_statuses() {
        assert!(AgentTaskStatus::Completed.is_terminal());
        assert!(AgentTaskStatus::Failed.is_terminal());
        assert!(!AgentTaskStatus::Expired.is_terminal());
    }
}
