//! Verifier errors.

use super::error_code::{self, DocDriftErrorCode};
use super::{AgentError, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Agent dispatch failed: {0}")]
    Agent(#[from] AgentError),

    #[error("Invalid version requirement '{requirement}': {message}")]
    InvalidVersion { requirement: String, message: String },
}

impl DocDriftErrorCode for VerificationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.error_code(),
            Self::Agent(e) => e.error_code(),
            Self::InvalidVersion { .. } => error_code::VERIFICATION_ERROR,
        }
    }
}
