use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One commit touching both a code file and a documentation file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoChange {
    pub repo_id: String,
    pub code_file: String,
    pub doc_file: String,
    pub commit_sha: String,
    pub committed_at: DateTime<Utc>,
}
