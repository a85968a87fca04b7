//! Scan runs: the bounded claim pipeline and its report.

pub mod report;
pub mod runner;

pub use report::{health_score, DeferredClaim, ScanReport};
pub use runner::ScanRunner;
