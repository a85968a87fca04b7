//! Error handling for DocDrift.
//! One error enum per subsystem, `thiserror` only, zero `anyhow`.

pub mod agent_error;
pub mod config_error;
pub mod error_code;
pub mod extraction_error;
pub mod mapping_error;
pub mod scan_error;
pub mod storage_error;
pub mod verification_error;

pub use agent_error::AgentError;
pub use config_error::ConfigError;
pub use error_code::DocDriftErrorCode;
pub use extraction_error::ExtractionError;
pub use mapping_error::MappingError;
pub use scan_error::{ClaimFailure, ScanError};
pub use storage_error::StorageError;
pub use verification_error::VerificationError;
