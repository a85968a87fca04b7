//! Mapper errors.

use super::error_code::{self, DocDriftErrorCode};
use super::StorageError;

/// Ambiguity is not an error; it is reported on the candidate set.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Index lookup failed: {0}")]
    Index(#[from] StorageError),

    #[error("Embedding failed for claim {claim_id}: {message}")]
    Embedding { claim_id: String, message: String },

    #[error("Embedding provider {provider} failed: {message}")]
    Provider { provider: String, message: String },
}

impl DocDriftErrorCode for MappingError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Index(e) => e.error_code(),
            Self::Embedding { .. } | Self::Provider { .. } => error_code::MAPPING_ERROR,
        }
    }
}
