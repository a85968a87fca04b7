//! # docdrift-core
//!
//! Foundation crate for DocDrift.
//! Defines the claim/mapping/verification data model, the collaborator traits
//! (codebase index, embeddings, co-change history), errors, config, constants,
//! and tracing setup. Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod tracing;
pub mod traits;

pub use config::DocDriftConfig;
pub use errors::{DocDriftErrorCode, ScanError};
pub use models::{
    AgentTask, AgentTaskStatus, AgentTaskType, Claim, ClaimMapping, ClaimType, CodeEntity,
    ExtractedValue, MappingMethod, Severity, SuppressionRule, Testability, Tier, Verdict,
    VerificationResult,
};
