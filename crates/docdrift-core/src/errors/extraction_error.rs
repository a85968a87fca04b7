//! Malformed claims handed over by the extractor.

use super::error_code::{self, DocDriftErrorCode};

/// A claim that cannot be processed. Recovered per claim: the claim is skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("claim {claim_id} has empty text")]
    EmptyText { claim_id: String },

    #[error("claim {claim_id} has extraction confidence {value} outside [0, 1]")]
    ConfidenceOutOfRange { claim_id: String, value: f64 },

    #[error("claim {claim_id} is typed {claim_type} but carries a {value_type} value")]
    ValueTypeMismatch {
        claim_id: String,
        claim_type: String,
        value_type: String,
    },

    #[error("claim {claim_id} has invalid line number 0")]
    InvalidLineNumber { claim_id: String },

    #[error("claim payload could not be decoded: {message}")]
    Malformed { message: String },
}

impl DocDriftErrorCode for ExtractionError {
    fn error_code(&self) -> &'static str {
        error_code::EXTRACTION_ERROR
    }
}
