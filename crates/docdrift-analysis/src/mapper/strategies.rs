//! Candidate-producing strategies. Each is a plain function over the index;
//! the mapper unions their output.

use std::sync::OnceLock;

use regex::Regex;

use docdrift_core::constants::{SUFFIX_MATCH_CONFIDENCE, SYMBOL_PREFIX_SCALE, SYMBOL_UNIQUE_CONFIDENCE};
use docdrift_core::errors::MappingError;
use docdrift_core::models::{Claim, ClaimMapping, ExtractedValue, MappingMethod};
use docdrift_core::traits::{CodebaseIndex, EmbeddingProvider};

/// Candidates from one strategy.
#[derive(Debug, Default)]
pub(crate) struct StrategyHits {
    pub mappings: Vec<ClaimMapping>,
    /// Files a referenced path matched by suffix, when it matched more than one.
    pub suffix_files: Vec<String>,
}

impl StrategyHits {
    fn extend(&mut self, other: StrategyHits) {
        self.mappings.extend(other.mappings);
        self.suffix_files.extend(other.suffix_files);
    }
}

/// Canonical repo-relative form of a documented path: forward slashes, no
/// leading `./` or `/`, no trailing `/`, no `:line` or `#Lnn` anchor.
pub(crate) fn normalize_path(raw: &str) -> String {
    static ANCHOR: OnceLock<Option<Regex>> = OnceLock::new();
    let mut p = raw
        .trim()
        .trim_matches(|c: char| c == '`' || c == '"' || c == '\'')
        .replace('\\', "/");
    if let Some(re) = ANCHOR.get_or_init(|| Regex::new(r"(:\d+(:\d+)?|#L\d+(-L?\d+)?)$").ok()) {
        p = re.replace(&p, "").into_owned();
    }
    let mut s = p.as_str();
    loop {
        if let Some(rest) = s.strip_prefix("./") {
            s = rest;
        } else if let Some(rest) = s.strip_prefix('/') {
            s = rest;
        } else {
            break;
        }
    }
    s.trim_end_matches('/').to_string()
}

/// `direct_reference`: the claim names a path that exists as-is.
pub(crate) fn direct_reference(
    index: &dyn CodebaseIndex,
    claim: &Claim,
) -> Result<StrategyHits, MappingError> {
    let mut hits = StrategyHits::default();
    let ExtractedValue::PathReference { path } = &claim.extracted_value else {
        return Ok(hits);
    };
    let path = normalize_path(path);
    if path.is_empty() {
        return Ok(hits);
    }
    if index.file_exists(&claim.repo_id, &path)? {
        hits.mappings.push(ClaimMapping::new(
            &claim.id,
            path,
            1.0,
            MappingMethod::DirectReference,
        ));
    }
    Ok(hits)
}

/// Names worth looking up as code symbols for this claim.
pub(crate) fn symbol_names(claim: &Claim) -> Vec<String> {
    let mut names: Vec<String> = match &claim.extracted_value {
        ExtractedValue::CodeExample { symbols, .. } => symbols.clone(),
        ExtractedValue::ApiRoute { method, path } => {
            vec![format!("{} {}", method.to_uppercase(), path)]
        }
        ExtractedValue::Config { key, .. } => vec![key.clone()],
        ExtractedValue::Environment {
            variable: Some(v), ..
        } => vec![v.clone()],
        _ => Vec::new(),
    };
    names.extend(
        claim
            .keywords
            .iter()
            .filter(|k| is_identifier_shaped(k))
            .cloned(),
    );
    names.retain(|n| !n.trim().is_empty());
    names.sort();
    names.dedup();
    names
}

/// `snake_case`, `camelCase`, `PascalCase` or `SCREAMING_CASE` words; plain
/// lowercase prose words are too noisy to look up.
pub(crate) fn is_identifier_shaped(word: &str) -> bool {
    static IDENT: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok()) else {
        return false;
    };
    if !re.is_match(word) || word.len() < 3 {
        return false;
    }
    let has_inner_upper = word.chars().skip(1).any(|c| c.is_ascii_uppercase());
    word.contains('_') || has_inner_upper
}

/// `symbol_search`: path suffixes for path claims, entity names otherwise.
/// Confidence is divided evenly across equally good matches.
pub(crate) fn symbol_search(
    index: &dyn CodebaseIndex,
    claim: &Claim,
) -> Result<StrategyHits, MappingError> {
    let mut hits = StrategyHits::default();

    if let ExtractedValue::PathReference { path } = &claim.extracted_value {
        let path = normalize_path(path);
        if !path.is_empty() {
            let files = index.files_with_suffix(&claim.repo_id, &path)?;
            if !files.is_empty() {
                let confidence = SUFFIX_MATCH_CONFIDENCE / files.len() as f64;
                if files.len() > 1 {
                    hits.suffix_files = files.clone();
                }
                hits.mappings.extend(files.into_iter().map(|f| {
                    ClaimMapping::new(&claim.id, f, confidence, MappingMethod::SymbolSearch)
                }));
            }
        }
    }

    for name in symbol_names(claim) {
        hits.extend(lookup_symbol(index, claim, &name)?);
    }
    Ok(hits)
}

fn lookup_symbol(
    index: &dyn CodebaseIndex,
    claim: &Claim,
    name: &str,
) -> Result<StrategyHits, MappingError> {
    let mut hits = StrategyHits::default();
    let (entities, scale) = match index.find_entities(&claim.repo_id, name, false)? {
        exact if !exact.is_empty() => (exact, 1.0),
        _ => (
            index.find_entities(&claim.repo_id, name, true)?,
            SYMBOL_PREFIX_SCALE,
        ),
    };
    if entities.is_empty() {
        return Ok(hits);
    }
    let confidence = SYMBOL_UNIQUE_CONFIDENCE * scale / entities.len() as f64;
    hits.mappings.extend(entities.into_iter().map(|e| {
        ClaimMapping::new(&claim.id, e.file_path, confidence, MappingMethod::SymbolSearch)
            .with_entity(e.id)
    }));
    Ok(hits)
}

/// `semantic_search`: cosine similarity between the claim and entity
/// embeddings, kept above `threshold`.
pub(crate) fn semantic_search(
    index: &dyn CodebaseIndex,
    embedder: &dyn EmbeddingProvider,
    claim: &Claim,
    threshold: f64,
    top_k: usize,
) -> Result<StrategyHits, MappingError> {
    let mut hits = StrategyHits::default();
    if !claim.claim_type.is_semantic_searchable() || top_k == 0 {
        return Ok(hits);
    }
    let embedding = match &claim.embedding {
        Some(e) if !e.is_empty() => e.clone(),
        _ => embedder
            .embed(&claim.claim_text)
            .map_err(|e| MappingError::Embedding {
                claim_id: claim.id.clone(),
                message: e.to_string(),
            })?,
    };
    if embedding.iter().all(|v| *v == 0.0) {
        return Ok(hits);
    }
    for (entity, similarity) in index.search_semantic(&claim.repo_id, &embedding, top_k)? {
        if similarity >= threshold {
            hits.mappings.push(
                ClaimMapping::new(
                    &claim.id,
                    entity.file_path,
                    similarity,
                    MappingMethod::SemanticSearch,
                )
                .with_entity(entity.id),
            );
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_decoration() {
        assert_eq!(normalize_path("./src/config/index.ts"), "src/config/index.ts");
        assert_eq!(normalize_path("`/src/lib/`"), "src/lib");
        assert_eq!(normalize_path("src\\main.rs:42"), "src/main.rs");
        assert_eq!(normalize_path("src/app.py#L10-L20"), "src/app.py");
    }

    #[test]
    fn identifier_shape() {
        assert!(is_identifier_shaped("loadConfig"));
        assert!(is_identifier_shaped("load_config"));
        assert!(is_identifier_shaped("MAX_RETRIES"));
        assert!(is_identifier_shaped("HttpClient"));
        assert!(!is_identifier_shaped("config"));
        assert!(!is_identifier_shaped("Config"));
        assert!(!is_identifier_shaped("two words"));
    }
}
