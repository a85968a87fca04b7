//! ScanReport: what one scan run produced.

use docdrift_core::errors::ClaimFailure;
use docdrift_core::models::{ScanStatus, Severity, Verdict, VerificationResult};
use docdrift_storage::queries::scan_runs::ScanCounts;

/// A claim whose verdict waits on an agent task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredClaim {
    pub claim_id: String,
    pub task_id: String,
}

#[derive(Debug)]
pub struct ScanReport {
    pub scan_run_id: String,
    pub repo_id: String,
    pub status: ScanStatus,
    /// Every result persisted during the run, suppressed ones included.
    pub results: Vec<VerificationResult>,
    pub deferred: Vec<DeferredClaim>,
    /// Untestable claims, never verified.
    pub skipped: Vec<String>,
    /// Testable claims the run did not reach (cancellation or abort).
    pub unprocessed: Vec<String>,
    pub failures: Vec<ClaimFailure>,
    /// Testable claims in the run, pending ones included.
    pub total_claims: usize,
    pub health_score: f64,
    min_severity: Severity,
}

impl ScanReport {
    pub(crate) fn new(scan_run_id: String, repo_id: String, min_severity: Severity) -> Self {
        Self {
            scan_run_id,
            repo_id,
            status: ScanStatus::Running,
            results: Vec::new(),
            deferred: Vec::new(),
            skipped: Vec::new(),
            unprocessed: Vec::new(),
            failures: Vec::new(),
            total_claims: 0,
            health_score: 1.0,
            min_severity,
        }
    }

    /// Unsuppressed results, drifted ones filtered by the minimum severity.
    pub fn visible(&self) -> impl Iterator<Item = &VerificationResult> {
        self.results.iter().filter(move |r| {
            !r.suppressed && (!r.is_drifted() || r.severity.map_or(true, |s| s >= self.min_severity))
        })
    }

    pub fn suppressed(&self) -> impl Iterator<Item = &VerificationResult> {
        self.results.iter().filter(|r| r.suppressed)
    }

    /// Visible drifted results, the user-facing findings.
    pub fn findings(&self) -> impl Iterator<Item = &VerificationResult> {
        self.visible().filter(|r| r.is_drifted())
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.results.iter().filter(|r| r.verdict == verdict).count()
    }

    /// Claims left `pending`: deferred to the agent tier, failed, or not reached.
    pub fn pending(&self) -> usize {
        self.total_claims
            .saturating_sub(self.count(Verdict::Verified) + self.count(Verdict::Drifted) + self.count(Verdict::Uncertain))
    }

    pub(crate) fn finalize(&mut self) {
        self.health_score = health_score(self.count(Verdict::Verified), self.total_claims);
    }

    pub(crate) fn counts(&self) -> ScanCounts {
        ScanCounts {
            total_claims: self.total_claims as u32,
            verified: self.count(Verdict::Verified) as u32,
            drifted: self.count(Verdict::Drifted) as u32,
            uncertain: self.count(Verdict::Uncertain) as u32,
            pending: self.pending() as u32,
            skipped: self.skipped.len() as u32,
        }
    }
}

/// `verified / total`, 1.0 for an empty run.
pub fn health_score(verified: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (verified as f64 / total as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_run_is_healthy() {
        assert_eq!(health_score(0, 0), 1.0);
    }

    #[test]
    fn pending_claims_lower_health() {
        assert!((health_score(3, 4) - 0.75).abs() < f64::EPSILON);
        assert_eq!(health_score(0, 5), 0.0);
    }
}
