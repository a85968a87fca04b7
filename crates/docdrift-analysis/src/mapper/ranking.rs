//! Union, co-change boost, ordering and ambiguity classification of
//! candidate mappings.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;

use docdrift_core::constants::TIE_EPSILON;
use docdrift_core::models::{ClaimMapping, MappingStatus, MappingWeights};

/// Saturating boost for `count` historical co-edits:
/// `max_boost * (1 - e^(-count / saturation))`, within `[0, 1]`.
pub fn co_change_boost(count: u32, max_boost: f64, saturation: f64) -> f64 {
    if count == 0 || saturation <= 0.0 {
        return 0.0;
    }
    (max_boost * (1.0 - (-(count as f64) / saturation).exp())).clamp(0.0, 1.0)
}

/// One mapping per `(code_file, code_entity_id)`, keeping the highest
/// confidence. First-seen order is preserved for equal keys.
pub(crate) fn dedup(mappings: Vec<ClaimMapping>) -> Vec<ClaimMapping> {
    let mut index: FxHashMap<(String, Option<String>), usize> = FxHashMap::default();
    let mut out: Vec<ClaimMapping> = Vec::with_capacity(mappings.len());
    for m in mappings {
        let key = (m.code_file.clone(), m.code_entity_id.clone());
        match index.get(&key) {
            Some(&i) => {
                if m.confidence > out[i].confidence {
                    out[i] = m;
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(m);
            }
        }
    }
    out
}

/// Best first by effective confidence. Equal scores fall back to strategy
/// strength and raw confidence, then file path and entity id so repeated
/// runs order identically.
pub(crate) fn rank(mappings: &mut [ClaimMapping], weights: MappingWeights) {
    mappings.sort_by(|a, b| {
        b.effective_confidence(weights)
            .partial_cmp(&a.effective_confidence(weights))
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.mapping_method.precedence().cmp(&a.mapping_method.precedence()))
            .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
            .then_with(|| a.code_file.cmp(&b.code_file))
            .then_with(|| a.code_entity_id.cmp(&b.code_entity_id))
    });
}

/// Classify a ranked list. Candidates tied at the top are ambiguous only
/// when they point at more than one file; the tie is a suffix match when
/// every tied file came from one ambiguous path suffix.
pub(crate) fn status(
    ranked: &[ClaimMapping],
    weights: MappingWeights,
    suffix_files: &[String],
) -> MappingStatus {
    let Some(best) = ranked.first() else {
        return MappingStatus::Unmapped;
    };
    let mut tied_files: Vec<&str> = ranked
        .iter()
        .take_while(|m| best.ties_with(m, weights))
        .map(|m| m.code_file.as_str())
        .collect();
    tied_files.sort_unstable();
    tied_files.dedup();
    if tied_files.len() < 2 {
        MappingStatus::Resolved
    } else if tied_files.iter().all(|f| suffix_files.iter().any(|s| s == f)) {
        MappingStatus::AmbiguousSuffixMatch
    } else {
        MappingStatus::AmbiguousTie
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdrift_core::models::MappingMethod;

    fn m(file: &str, entity: Option<&str>, conf: f64) -> ClaimMapping {
        let base = ClaimMapping::new("c1", file, conf, MappingMethod::SymbolSearch);
        match entity {
            Some(e) => base.with_entity(e),
            None => base,
        }
    }

    #[test]
    fn boost_saturates() {
        assert_eq!(co_change_boost(0, 0.2, 5.0), 0.0);
        let one = co_change_boost(1, 0.2, 5.0);
        let many = co_change_boost(1000, 0.2, 5.0);
        assert!(one > 0.0 && one < many);
        assert!((many - 0.2).abs() < 1e-6);
    }

    #[test]
    fn dedup_keeps_highest() {
        let out = dedup(vec![m("a.ts", None, 0.4), m("a.ts", None, 0.9), m("b.ts", None, 0.5)]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].confidence, 0.9);
    }

    #[test]
    fn ties_in_one_file_are_resolved() {
        let w = MappingWeights::default();
        let mut ms = vec![m("a.ts", Some("e1"), 0.5), m("a.ts", Some("e2"), 0.5)];
        rank(&mut ms, w);
        assert_eq!(status(&ms, w, &[]), MappingStatus::Resolved);
    }

    #[test]
    fn ties_across_files_are_ambiguous() {
        let w = MappingWeights::default();
        let mut ms = vec![m("b/index.ts", None, 0.45), m("a/index.ts", None, 0.45)];
        rank(&mut ms, w);
        assert_eq!(ms[0].code_file, "a/index.ts");
        let suffix = vec!["a/index.ts".to_string(), "b/index.ts".to_string()];
        assert_eq!(status(&ms, w, &suffix), MappingStatus::AmbiguousSuffixMatch);
        assert_eq!(status(&ms, w, &[]), MappingStatus::AmbiguousTie);
    }

    #[test]
    fn boost_breaks_tie() {
        let w = MappingWeights::default();
        let mut a = m("a.ts", None, 0.5);
        a.co_change_boost = 0.1;
        let mut ms = vec![m("b.ts", None, 0.5), a];
        rank(&mut ms, w);
        assert_eq!(ms[0].code_file, "a.ts");
        assert_eq!(status(&ms, w, &[]), MappingStatus::Resolved);
    }

    #[test]
    fn direct_reference_outranks_a_boosted_symbol_match() {
        let w = MappingWeights::default();
        let mut loader = m("src/loader.ts", Some("loadConfig"), 0.95);
        loader.co_change_boost = 0.196;
        let direct = ClaimMapping::new("c1", "src/config.ts", 1.0, MappingMethod::DirectReference);
        let mut ms = vec![loader, direct];
        rank(&mut ms, w);
        assert_eq!(ms[0].code_file, "src/config.ts");
        assert_eq!(status(&ms, w, &[]), MappingStatus::Resolved);
    }

    #[test]
    fn score_tie_outside_the_suffix_set_is_a_plain_tie() {
        let w = MappingWeights::default();
        let mut ms = vec![m("a/index.ts", None, 0.45), m("lib/other.ts", Some("e1"), 0.45)];
        rank(&mut ms, w);
        let suffix = vec!["a/index.ts".to_string(), "b/index.ts".to_string()];
        assert_eq!(status(&ms, w, &suffix), MappingStatus::AmbiguousTie);
    }
}
