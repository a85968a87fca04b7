//! Hashing TF-IDF embedder.
//!
//! Projects terms into fixed-dimension buckets and weights them by term
//! frequency. Deterministic and offline, so claims and code entities embedded
//! by separate processes land in the same vector space.

use rustc_hash::FxHashMap;

use docdrift_core::errors::MappingError;
use docdrift_core::traits::EmbeddingProvider;

/// Default vector width.
pub const DEFAULT_DIMENSIONS: usize = 256;

pub struct TfIdfEmbedder {
    dimensions: usize,
}

impl TfIdfEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// FNV-1a bucket for a term.
    fn bucket(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h as usize) % dims
    }

    /// Lowercase terms, splitting identifiers on `_` and camelCase humps so
    /// `loadConfig` in prose and `load_config` in code share terms.
    fn tokenize(text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            let mut current = String::new();
            let mut prev_lower = false;
            for c in word.chars() {
                if c.is_uppercase() && prev_lower && !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                prev_lower = c.is_lowercase() || c.is_ascii_digit();
                current.extend(c.to_lowercase());
            }
            if !current.is_empty() {
                out.push(current);
            }
        }
        out.retain(|t| t.len() >= 2);
        out
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let tokens = Self::tokenize(text);
        let mut vec = vec![0.0f32; self.dimensions];
        if tokens.is_empty() {
            return vec;
        }

        let mut tf: FxHashMap<&str, f32> = FxHashMap::default();
        for tok in &tokens {
            *tf.entry(tok.as_str()).or_default() += 1.0;
        }

        let total = tokens.len() as f32;
        for (term, count) in &tf {
            // Longer terms are rarer; short ones behave like stopwords.
            let idf = 1.0 + (term.len() as f32).ln();
            vec[Self::bucket(term, self.dimensions)] += (count / total) * idf;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

impl Default for TfIdfEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl EmbeddingProvider for TfIdfEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, MappingError> {
        Ok(self.vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MappingError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "tfidf-hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cos(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = TfIdfEmbedder::new(64);
        let v = e.embed("").unwrap();
        assert_eq!(v.len(), 64);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn output_is_unit_length() {
        let v = TfIdfEmbedder::default().embed("retries failed uploads three times").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn identifier_styles_share_terms() {
        let tokens = TfIdfEmbedder::tokenize("loadConfig load_config");
        assert_eq!(tokens, vec!["load", "config", "load", "config"]);
    }

    #[test]
    fn related_text_scores_higher() {
        let e = TfIdfEmbedder::default();
        let claim = e.embed("the client retries failed uploads").unwrap();
        let code = e.embed("fn retry_upload(client: &Client) retries failed uploads").unwrap();
        let other = e.embed("render the settings page template").unwrap();
        assert!(cos(&claim, &code) > cos(&claim, &other));
    }

    #[test]
    fn batch_matches_single() {
        let e = TfIdfEmbedder::new(128);
        let texts = vec!["alpha beta".to_string(), "gamma delta".to_string()];
        let batch = e.embed_batch(&texts).unwrap();
        assert_eq!(batch[1], e.embed("gamma delta").unwrap());
    }
}
