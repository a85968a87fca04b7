//! Tier 3: semantic similarity.
//!
//! Verifies only on a single unambiguous `semantic_search` top candidate at
//! or above the verify threshold, and never over a structural concern.
//! Everything else escalates.

use docdrift_core::models::{CandidateSet, MappingMethod, MappingWeights};

use super::TierVerdict;

pub(crate) fn check(
    candidates: &CandidateSet,
    weights: MappingWeights,
    threshold: f64,
    structural_concern: bool,
) -> Option<TierVerdict> {
    if structural_concern || candidates.is_ambiguous() {
        return None;
    }
    let top = candidates.top()?;
    if top.mapping_method != MappingMethod::SemanticSearch {
        return None;
    }
    if candidates.top_tied(weights).len() > 1 {
        return None;
    }
    let similarity = top.confidence;
    if similarity < threshold {
        return None;
    }
    Some(
        TierVerdict::verified(
            similarity,
            format!("`{}` matches the claim with similarity {similarity:.2}", top.code_file),
        )
        .with_evidence(vec![top.code_file.clone()]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::candidate_set;
    use docdrift_core::models::ClaimMapping;

    fn set(mappings: Vec<ClaimMapping>) -> CandidateSet {
        candidate_set("c", mappings, MappingWeights::default(), &[], false)
    }

    #[test]
    fn high_similarity_verifies() {
        let s = set(vec![ClaimMapping::new("c", "src/auth.rs", 0.91, MappingMethod::SemanticSearch)]);
        let v = check(&s, MappingWeights::default(), 0.85, false).unwrap();
        assert_eq!(v.confidence, 0.91);
    }

    #[test]
    fn borderline_similarity_escalates() {
        let s = set(vec![ClaimMapping::new("c", "src/auth.rs", 0.8, MappingMethod::SemanticSearch)]);
        assert!(check(&s, MappingWeights::default(), 0.85, false).is_none());
    }

    #[test]
    fn structural_concern_blocks() {
        let s = set(vec![ClaimMapping::new("c", "src/auth.rs", 0.95, MappingMethod::SemanticSearch)]);
        assert!(check(&s, MappingWeights::default(), 0.85, true).is_none());
    }

    #[test]
    fn tie_across_files_escalates() {
        let s = set(vec![
            ClaimMapping::new("c", "a.rs", 0.9, MappingMethod::SemanticSearch),
            ClaimMapping::new("c", "b.rs", 0.9, MappingMethod::SemanticSearch),
        ]);
        assert!(s.is_ambiguous());
        assert!(check(&s, MappingWeights::default(), 0.85, false).is_none());
    }

    #[test]
    fn non_semantic_top_escalates() {
        let s = set(vec![ClaimMapping::new("c", "a.rs", 0.95, MappingMethod::SymbolSearch)]);
        assert!(check(&s, MappingWeights::default(), 0.85, false).is_none());
    }
}
