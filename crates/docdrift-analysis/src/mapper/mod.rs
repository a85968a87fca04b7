//! Claim-to-code mapper.
//!
//! Runs the candidate strategies (direct reference, symbol search, semantic
//! search), unions their output, applies the co-change boost and ranks the
//! result. Ties across files are reported on the candidate set, never
//! collapsed. Semantic claims whose set is empty or ambiguous get an
//! `llm_assisted` agent task. Manual pins replace all of this.

mod llm_assisted;
pub mod ranking;
pub(crate) mod strategies;

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, instrument};

use docdrift_core::config::{DocDriftConfig, MappingConfig};
use docdrift_core::errors::{MappingError, StorageError};
use docdrift_core::models::{CandidateSet, Claim, ClaimMapping, MappingMethod, MappingWeights};
use docdrift_core::traits::{CoChangeSource, CodebaseIndex, EmbeddingProvider};
use docdrift_storage::queries::{manual_mappings, mappings};
use docdrift_storage::DatabaseManager;

use crate::agent::AgentQueue;
use crate::embedding::TfIdfEmbedder;

pub(crate) use llm_assisted::slim as slim_claim;
pub use ranking::co_change_boost;

pub struct Mapper {
    db: Arc<DatabaseManager>,
    index: Arc<dyn CodebaseIndex>,
    co_change: Arc<dyn CoChangeSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    queue: Option<AgentQueue>,
    config: MappingConfig,
    max_agent_files: usize,
}

impl Mapper {
    /// A mapper using the hashing TF-IDF embedder. `llm_assisted` is active
    /// when the agent tier is enabled.
    pub fn new(
        db: Arc<DatabaseManager>,
        index: Arc<dyn CodebaseIndex>,
        co_change: Arc<dyn CoChangeSource>,
        config: &DocDriftConfig,
    ) -> Self {
        let queue = config
            .agent
            .effective_enabled()
            .then(|| AgentQueue::new(db.clone(), &config.agent));
        Self {
            db,
            index,
            co_change,
            embedder: Arc::new(TfIdfEmbedder::default()),
            queue,
            config: config.mapping.clone(),
            max_agent_files: config.agent.effective_max_agent_files_per_claim(),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn weights(&self) -> MappingWeights {
        self.config.weights()
    }

    /// Map a claim and persist its candidates under `scan_run_id`.
    #[instrument(skip(self, claim), fields(claim_id = %claim.id))]
    pub fn map_claim(&self, scan_run_id: &str, claim: &Claim) -> Result<CandidateSet, MappingError> {
        let mut set = match self.pinned(claim)? {
            Some(set) => set,
            None => self.compute(claim)?,
        };

        if !set.pinned {
            if let Some(queue) = &self.queue {
                set.pending_agent_task =
                    llm_assisted::enqueue(queue, scan_run_id, claim, &set, self.max_agent_files)?;
            }
        }

        if !set.mappings.is_empty() {
            self.db
                .with_writer(|conn| mappings::insert_mappings(conn, scan_run_id, &set.mappings))?;
        }
        debug!(
            candidate_count = set.mappings.len(),
            status = %set.status,
            pinned = set.pinned,
            "claim mapped"
        );
        Ok(set)
    }

    /// Rebuild a claim's candidate set from what a scan run persisted,
    /// including mappings added later by agent results.
    pub fn load_candidates(&self, scan_run_id: &str, claim: &Claim) -> Result<CandidateSet, StorageError> {
        let stored = self
            .db
            .with_reader(|conn| mappings::list_for_claim(conn, scan_run_id, &claim.id))?;
        let pinned = stored.iter().any(|m| m.mapping_method == MappingMethod::Manual);
        Ok(candidate_set(&claim.id, stored, self.weights(), &[], pinned))
    }

    /// Pin a claim to a file (and optionally an entity). Pins override all
    /// strategies until removed.
    pub fn pin(&self, claim_id: &str, code_file: &str, entity_id: Option<&str>) -> Result<(), StorageError> {
        self.db
            .with_writer(|conn| manual_mappings::pin(conn, claim_id, code_file, entity_id))
    }

    pub fn unpin(&self, claim_id: &str, code_file: &str, entity_id: Option<&str>) -> Result<bool, StorageError> {
        self.db
            .with_writer(|conn| manual_mappings::unpin(conn, claim_id, code_file, entity_id))
    }

    fn pinned(&self, claim: &Claim) -> Result<Option<CandidateSet>, MappingError> {
        let pins = self
            .db
            .with_reader(|conn| manual_mappings::list_for_claim(conn, &claim.id))?;
        if pins.is_empty() {
            return Ok(None);
        }
        let pinned = pins
            .into_iter()
            .map(|p| {
                let m = ClaimMapping::new(&claim.id, p.code_file, 1.0, MappingMethod::Manual);
                match p.code_entity_id {
                    Some(e) => m.with_entity(e),
                    None => m,
                }
            })
            .collect();
        Ok(Some(candidate_set(&claim.id, pinned, self.weights(), &[], true)))
    }

    fn compute(&self, claim: &Claim) -> Result<CandidateSet, MappingError> {
        let index = self.index.as_ref();
        let mut found = strategies::direct_reference(index, claim)?;
        let symbols = strategies::symbol_search(index, claim)?;
        let semantic = strategies::semantic_search(
            index,
            self.embedder.as_ref(),
            claim,
            self.config.effective_semantic_threshold(),
            self.config.effective_semantic_top_k(),
        )?;
        found.mappings.extend(symbols.mappings);
        found.mappings.extend(semantic.mappings);
        let suffix_files = symbols.suffix_files;

        let mut merged = ranking::dedup(found.mappings);
        self.apply_co_change(claim, &mut merged)?;
        Ok(candidate_set(&claim.id, merged, self.weights(), &suffix_files, false))
    }

    fn apply_co_change(&self, claim: &Claim, mappings: &mut [ClaimMapping]) -> Result<(), MappingError> {
        let max_boost = self.config.effective_co_change_max_boost();
        let saturation = self.config.effective_co_change_saturation();
        if max_boost <= 0.0 {
            return Ok(());
        }
        let mut per_file: FxHashMap<String, f64> = FxHashMap::default();
        for m in mappings.iter_mut() {
            let boost = match per_file.get(&m.code_file) {
                Some(b) => *b,
                None => {
                    let count =
                        self.co_change
                            .co_change_count(&claim.repo_id, &m.code_file, &claim.source_file)?;
                    let b = co_change_boost(count, max_boost, saturation);
                    per_file.insert(m.code_file.clone(), b);
                    b
                }
            };
            m.co_change_boost = boost;
        }
        Ok(())
    }
}

/// Rank `mappings` and classify the result.
pub fn candidate_set(
    claim_id: &str,
    mut mappings: Vec<ClaimMapping>,
    weights: MappingWeights,
    suffix_files: &[String],
    pinned: bool,
) -> CandidateSet {
    ranking::rank(&mut mappings, weights);
    let status = ranking::status(&mappings, weights, suffix_files);
    CandidateSet {
        claim_id: claim_id.to_string(),
        mappings,
        status,
        pinned,
        pending_agent_task: None,
    }
}
