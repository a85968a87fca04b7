//! Standard span field names used across DocDrift subsystems.
//!
//! Consistent names keep structured log queries stable.

/// Scan run identifier.
pub const SCAN_RUN_ID: &str = "scan_run_id";

/// Claim identifier.
pub const CLAIM_ID: &str = "claim_id";

/// Agent task identifier.
pub const TASK_ID: &str = "task_id";

/// Agent worker identifier.
pub const WORKER_ID: &str = "worker_id";

/// Verification tier (1-4).
pub const TIER: &str = "tier";

/// Mapper: candidates produced for a claim.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Verifier: tier duration in milliseconds.
pub const TIER_DURATION_MS: &str = "tier_duration_ms";
