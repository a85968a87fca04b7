//! Stable machine-readable error codes.

/// Every DocDrift error exposes a stable code for reporters and the CLI.
pub trait DocDriftErrorCode {
    fn error_code(&self) -> &'static str;
}

pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const EXTRACTION_ERROR: &str = "EXTRACTION_ERROR";
pub const MAPPING_ERROR: &str = "MAPPING_ERROR";
pub const VERIFICATION_ERROR: &str = "VERIFICATION_ERROR";
pub const AGENT_TASK_FAILURE: &str = "AGENT_TASK_FAILURE";
pub const LEASE_LOST: &str = "LEASE_LOST";
pub const CANCELLED: &str = "CANCELLED";
