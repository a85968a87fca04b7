//! Scan-level errors and per-claim failure collection.

use super::error_code::{self, DocDriftErrorCode};
use super::{
    AgentError, ConfigError, ExtractionError, MappingError, StorageError, VerificationError,
};

/// Errors that can occur during a scan run.
/// Aggregates subsystem errors via `From` conversions.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan cancelled")]
    Cancelled,
}

impl ScanError {
    /// Database errors abort the scan; everything else is isolated to one claim.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Storage(_) | Self::Config(_) => true,
            Self::Mapping(MappingError::Index(_)) => true,
            Self::Verification(VerificationError::Storage(_)) => true,
            Self::Agent(AgentError::Storage(_)) => true,
            _ => false,
        }
    }
}

impl DocDriftErrorCode for ScanError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Extraction(e) => e.error_code(),
            Self::Mapping(e) => e.error_code(),
            Self::Verification(e) => e.error_code(),
            Self::Agent(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
            Self::Cancelled => error_code::CANCELLED,
        }
    }
}

/// A non-fatal, per-claim failure recorded on the scan report.
#[derive(Debug)]
pub struct ClaimFailure {
    pub claim_id: String,
    /// Pipeline step that failed ("validate", "map", "verify", "persist").
    pub step: &'static str,
    pub error: ScanError,
}

impl ClaimFailure {
    pub fn new(claim_id: impl Into<String>, step: &'static str, error: impl Into<ScanError>) -> Self {
        Self {
            claim_id: claim_id.into(),
            step,
            error: error.into(),
        }
    }
}
