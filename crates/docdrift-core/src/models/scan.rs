//! Scan run bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::string_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

string_enum!(ScanStatus {
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRun {
    pub id: String,
    pub repo_id: String,
    pub status: ScanStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub total_claims: u32,
    pub verified: u32,
    pub drifted: u32,
    pub uncertain: u32,
    pub pending: u32,
    pub skipped: u32,
    #[serde(default)]
    pub error: Option<String>,
}
