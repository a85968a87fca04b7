//! Configuration system for DocDrift.
//! TOML-based, 5-layer resolution: CLI > env > project > user > defaults.

pub mod agent_config;
pub mod docdrift_config;
pub mod mapping_config;
pub mod suppression_config;
pub mod url_check_config;
pub mod verification_config;

pub use agent_config::AgentConfig;
pub use docdrift_config::{CliOverrides, DocDriftConfig};
pub use mapping_config::MappingConfig;
pub use suppression_config::SuppressionConfig;
pub use url_check_config::UrlCheckConfig;
pub use verification_config::VerificationConfig;
