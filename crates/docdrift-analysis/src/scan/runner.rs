//! ScanRunner: one scan run end to end.
//!
//! Claims are validated and persisted up front, then mapped and verified in
//! parallel on a dedicated rayon pool. Every claim is isolated: a failure is
//! recorded on the report and the batch carries on. Only storage failures
//! abort the run, and results committed before the abort stay valid.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use docdrift_core::config::DocDriftConfig;
use docdrift_core::errors::{ClaimFailure, ConfigError, ExtractionError, ScanError, StorageError};
use docdrift_core::models::{Claim, ScanStatus, Severity, Verdict, VerificationResult, VerificationStatus};
use docdrift_core::traits::{Cancellable, CancellationToken, CoChangeSource, CodebaseIndex, EmbeddingProvider};
use docdrift_storage::connection::writer::with_immediate_transaction;
use docdrift_storage::queries::claims;
use docdrift_storage::queries::scan_runs::{self, ScanCounts};
use docdrift_storage::DatabaseManager;

use super::report::{DeferredClaim, ScanReport};
use crate::mapper::Mapper;
use crate::suppression::{RuleSet, SuppressionEngine};
use crate::verifier::url_probe::UrlProbe;
use crate::verifier::{persist_result, Verifier, VerifyOutcome};

enum ClaimOutcome {
    Final(VerificationResult),
    Deferred(DeferredClaim),
    Unprocessed(String),
    Failed(ClaimFailure),
}

pub struct ScanRunner {
    db: Arc<DatabaseManager>,
    mapper: Mapper,
    verifier: Verifier,
    suppression: SuppressionEngine,
    pool: rayon::ThreadPool,
    min_severity: Severity,
}

impl ScanRunner {
    /// The claim pool is sized by `agent.concurrency`.
    pub fn new(
        db: Arc<DatabaseManager>,
        index: Arc<dyn CodebaseIndex>,
        co_change: Arc<dyn CoChangeSource>,
        config: &DocDriftConfig,
    ) -> Result<Self, ScanError> {
        let threads = config.agent.effective_concurrency();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("docdrift-scan-{i}"))
            .build()
            .map_err(|e| ConfigError::ValidationFailed {
                field: "agent.concurrency".to_string(),
                message: format!("failed to start {threads} scan threads: {e}"),
            })?;
        Ok(Self {
            mapper: Mapper::new(db.clone(), index.clone(), co_change, config),
            verifier: Verifier::new(db.clone(), index, config),
            suppression: SuppressionEngine::new(db.clone()),
            db,
            pool,
            min_severity: config.verification.effective_min_severity(),
        })
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.mapper = self.mapper.with_embedder(embedder);
        self
    }

    /// Replace (or remove) the Tier-1 URL probe.
    pub fn with_url_probe(mut self, probe: Option<Arc<dyn UrlProbe>>) -> Self {
        self.verifier = self.verifier.with_url_probe(probe);
        self
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Run a scan over `batch`. Untestable claims are persisted but not
    /// verified. Cancellation leaves unreached claims `pending`.
    #[instrument(skip(self, batch, cancel), fields(repo_id = %repo_id, claim_count = batch.len()))]
    pub fn run(
        &self,
        repo_id: &str,
        batch: Vec<Claim>,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let started = Instant::now();
        let scan_run_id = uuid::Uuid::new_v4().to_string();
        self.db
            .with_writer(|conn| scan_runs::insert_scan_start(conn, &scan_run_id, repo_id, Utc::now()))?;
        info!(scan_run_id = %scan_run_id, "scan started");

        let mut report = ScanReport::new(scan_run_id.clone(), repo_id.to_string(), self.min_severity);
        let mut accepted = Vec::with_capacity(batch.len());
        for claim in batch {
            match validate(repo_id, &claim) {
                Ok(()) => accepted.push(claim),
                Err(e) => {
                    warn!(claim_id = %claim.id, error = %e, "claim rejected");
                    report.failures.push(ClaimFailure::new(&claim.id, "validate", e));
                }
            }
        }

        if let Err(e) = self.store_claims(&scan_run_id, &accepted) {
            return Err(self.abort(&mut report, e.into()));
        }
        let (testable, untestable): (Vec<Claim>, Vec<Claim>) =
            accepted.into_iter().partition(Claim::is_testable);
        report.skipped = untestable.into_iter().map(|c| c.id).collect();
        report.total_claims = testable.len();

        let rules = match self
            .suppression
            .release_inactive(repo_id)
            .and_then(|_| self.suppression.load(repo_id))
        {
            Ok(rules) => rules,
            Err(e) => return Err(self.abort(&mut report, e.into())),
        };

        let outcomes = self.process_all(&scan_run_id, &rules, &testable, cancel);
        if let Some(fatal) = absorb(&mut report, outcomes) {
            return Err(self.abort(&mut report, fatal));
        }

        let status = if cancel.is_cancelled() {
            ScanStatus::Cancelled
        } else {
            ScanStatus::Completed
        };
        let counts = report.counts();
        self.complete(&mut report, status, counts)?;
        info!(
            scan_run_id = %scan_run_id,
            status = %status,
            verified = report.count(Verdict::Verified),
            drifted = report.count(Verdict::Drifted),
            deferred = report.deferred.len(),
            failures = report.failures.len(),
            health_score = report.health_score,
            duration_ms = started.elapsed().as_millis() as u64,
            "scan finished"
        );
        Ok(report)
    }

    /// Re-run Tiers 1-3 for this run's claims still `pending`, recording the
    /// results under `scan_run_id`. Resumes a run that aborted or was
    /// cancelled; claims already waiting on the agent reuse their task, and
    /// claims another run is verifying are left to that run.
    #[instrument(skip(self, cancel))]
    pub fn rerun_pending(&self, scan_run_id: &str, cancel: &CancellationToken) -> Result<ScanReport, ScanError> {
        let run = self
            .db
            .with_reader(|conn| scan_runs::get(conn, scan_run_id))?
            .ok_or_else(|| StorageError::NotFound {
                entity: "scan run",
                id: scan_run_id.to_string(),
            })?;
        let pending: Vec<Claim> = self
            .db
            .with_reader(|conn| claims::list_for_scan_run_by_status(conn, &run.id, VerificationStatus::Pending))?
            .into_iter()
            .filter(Claim::is_testable)
            .collect();
        debug!(pending = pending.len(), "resuming pending claims");

        let mut report = ScanReport::new(run.id.clone(), run.repo_id.clone(), self.min_severity);
        report.total_claims = pending.len();
        self.suppression.release_inactive(&run.repo_id)?;
        let rules = self.suppression.load(&run.repo_id)?;
        let outcomes = self.process_all(&run.id, &rules, &pending, cancel);
        if let Some(fatal) = absorb(&mut report, outcomes) {
            return Err(self.abort(&mut report, fatal));
        }

        let fresh = report.counts();
        let finalized = fresh.verified + fresh.drifted + fresh.uncertain;
        let counts = ScanCounts {
            total_claims: run.total_claims.max(fresh.total_claims),
            verified: run.verified + fresh.verified,
            drifted: run.drifted + fresh.drifted,
            uncertain: run.uncertain + fresh.uncertain,
            pending: run.pending.saturating_sub(finalized),
            skipped: run.skipped,
        };
        let status = if cancel.is_cancelled() {
            ScanStatus::Cancelled
        } else {
            ScanStatus::Completed
        };
        self.complete(&mut report, status, counts)?;
        Ok(report)
    }

    fn store_claims(&self, scan_run_id: &str, batch: &[Claim]) -> Result<(), StorageError> {
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                for claim in batch {
                    claims::upsert_claim(tx, claim)?;
                    claims::add_to_scan_run(tx, scan_run_id, &claim.id)?;
                    if claim.is_testable() {
                        claims::set_verification_status(tx, &claim.id, VerificationStatus::Pending, None)?;
                    }
                }
                Ok(())
            })
        })
    }

    fn process_all(
        &self,
        scan_run_id: &str,
        rules: &RuleSet,
        batch: &[Claim],
        cancel: &CancellationToken,
    ) -> Vec<ClaimOutcome> {
        let aborted = AtomicBool::new(false);
        self.pool.install(|| {
            batch
                .par_iter()
                .map(|claim| self.process_claim(scan_run_id, rules, claim, cancel, &aborted))
                .collect()
        })
    }

    fn process_claim(
        &self,
        scan_run_id: &str,
        rules: &RuleSet,
        claim: &Claim,
        cancel: &CancellationToken,
        aborted: &AtomicBool,
    ) -> ClaimOutcome {
        if cancel.is_cancelled() || aborted.load(Ordering::Relaxed) {
            return ClaimOutcome::Unprocessed(claim.id.clone());
        }
        let outcome = self.map_and_verify(scan_run_id, rules, claim);
        if let ClaimOutcome::Failed(failure) = &outcome {
            if failure.error.is_fatal() {
                aborted.store(true, Ordering::Relaxed);
            } else {
                warn!(claim_id = %claim.id, step = failure.step, error = %failure.error, "claim failed");
            }
        }
        outcome
    }

    fn map_and_verify(&self, scan_run_id: &str, rules: &RuleSet, claim: &Claim) -> ClaimOutcome {
        let candidates = match self.mapper.map_claim(scan_run_id, claim) {
            Ok(set) => set,
            Err(e) => return ClaimOutcome::Failed(ClaimFailure::new(&claim.id, "map", e)),
        };
        match self.verifier.verify(scan_run_id, claim, &candidates) {
            Ok(VerifyOutcome::Final(result)) => match persist_result(&self.db, rules, claim, result, true) {
                Ok(stored) => ClaimOutcome::Final(stored),
                Err(e) => ClaimOutcome::Failed(ClaimFailure::new(&claim.id, "persist", e)),
            },
            Ok(VerifyOutcome::Deferred { task_id }) => ClaimOutcome::Deferred(DeferredClaim {
                claim_id: claim.id.clone(),
                task_id,
            }),
            Err(e) => ClaimOutcome::Failed(ClaimFailure::new(&claim.id, "verify", e)),
        }
    }

    fn complete(&self, report: &mut ScanReport, status: ScanStatus, counts: ScanCounts) -> Result<(), StorageError> {
        report.status = status;
        report.finalize();
        self.db.with_writer(|conn| {
            scan_runs::update_scan_complete(conn, &report.scan_run_id, status, counts, None)
        })?;
        if let Err(e) = self.db.checkpoint() {
            warn!(error = %e, "WAL checkpoint failed");
        }
        Ok(())
    }

    /// Mark the run failed and hand back the error that killed it.
    fn abort(&self, report: &mut ScanReport, error: ScanError) -> ScanError {
        report.status = ScanStatus::Failed;
        report.finalize();
        let message = error.to_string();
        warn!(scan_run_id = %report.scan_run_id, error = %message, "scan aborted");
        let counts = report.counts();
        if let Err(e) = self.db.with_writer(|conn| {
            scan_runs::update_scan_complete(conn, &report.scan_run_id, ScanStatus::Failed, counts, Some(&message))
        }) {
            warn!(error = %e, "could not record scan failure");
        }
        error
    }
}

fn validate(repo_id: &str, claim: &Claim) -> Result<(), ExtractionError> {
    claim.validate()?;
    if claim.repo_id != repo_id {
        return Err(ExtractionError::Malformed {
            message: format!("claim {} belongs to repo {}, not {repo_id}", claim.id, claim.repo_id),
        });
    }
    Ok(())
}

/// Fold claim outcomes into the report. Returns the first fatal error.
fn absorb(report: &mut ScanReport, outcomes: Vec<ClaimOutcome>) -> Option<ScanError> {
    let mut fatal = None;
    for outcome in outcomes {
        match outcome {
            ClaimOutcome::Final(result) => report.results.push(result),
            ClaimOutcome::Deferred(d) => report.deferred.push(d),
            ClaimOutcome::Unprocessed(id) => report.unprocessed.push(id),
            ClaimOutcome::Failed(failure) if failure.error.is_fatal() && fatal.is_none() => {
                report.unprocessed.push(failure.claim_id);
                fatal = Some(failure.error);
            }
            ClaimOutcome::Failed(failure) => report.failures.push(failure),
        }
    }
    fatal
}
