//! Persisting verification results.
//!
//! Results are keyed by `(claim_id, scan_run_id, verification_path)`; a
//! second write under the same key returns the stored row unchanged, so
//! re-running a claim or re-applying an agent result is harmless.

use docdrift_core::errors::StorageError;
use docdrift_core::models::{Claim, Verdict, VerificationResult, VerificationStatus};
use docdrift_storage::connection::writer::with_immediate_transaction;
use docdrift_storage::queries::{claims, results};
use docdrift_storage::DatabaseManager;
use tracing::debug;

use crate::suppression::RuleSet;

pub(crate) fn status_for(verdict: Verdict) -> VerificationStatus {
    match verdict {
        Verdict::Verified => VerificationStatus::Verified,
        Verdict::Drifted => VerificationStatus::Drifted,
        Verdict::Uncertain => VerificationStatus::Uncertain,
    }
}

/// Stamp suppression, insert the result and (when `update_claim`) point the
/// claim at it. Returns the stored row, which is the earlier one when the
/// key already existed.
pub fn persist_result(
    db: &DatabaseManager,
    rules: &RuleSet,
    claim: &Claim,
    mut result: VerificationResult,
    update_claim: bool,
) -> Result<VerificationResult, StorageError> {
    if let Some(rule) = rules.matches(claim) {
        result.suppressed = true;
        result.suppression_rule_id = Some(rule.id.clone());
    }
    db.with_writer(|conn| {
        with_immediate_transaction(conn, |tx| {
            if results::insert_result(tx, &result)? {
                if update_claim {
                    claims::set_verification_status(
                        tx,
                        &result.claim_id,
                        status_for(result.verdict),
                        Some(&result.id),
                    )?;
                }
                return Ok(result);
            }
            debug!(claim_id = %result.claim_id, path = %result.verification_path, "result already recorded");
            results::get_by_key(tx, &result.claim_id, &result.scan_run_id, result.verification_path)?
                .ok_or_else(|| StorageError::NotFound {
                    entity: "verification result",
                    id: result.id.clone(),
                })
        })
    })
}
