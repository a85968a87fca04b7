//! # docdrift-analysis
//!
//! The drift engine. Claims flow through the [`mapper`] (candidate code
//! locations), the [`verifier`] ladder (tiers 1-3 inline, tier 4 via the
//! [`agent`] queue) and the [`suppression`] filter before being persisted.
//! [`scan::ScanRunner`] drives one scan run end to end.

pub mod agent;
pub mod embedding;
pub mod mapper;
pub mod scan;
pub mod suppression;
pub mod verifier;

pub use agent::{AgentExecutor, AgentQueue, AgentWorkerPool, HttpAgentExecutor, ResultApplier};
pub use embedding::TfIdfEmbedder;
pub use mapper::Mapper;
pub use scan::{ScanReport, ScanRunner};
pub use suppression::{FeedbackService, SuppressionEngine};
pub use verifier::{Verifier, VerifyOutcome};
