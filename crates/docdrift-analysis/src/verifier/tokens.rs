//! Token counting for the Tier-4 evidence budget.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use moka::sync::Cache;
use rustc_hash::FxHasher;
use tiktoken_rs::CoreBPE;
use tracing::warn;

use docdrift_core::constants::CHARS_PER_TOKEN;

/// cl100k_base token counter with a content-hash cache. Falls back to a
/// characters-per-token estimate when the tokenizer cannot be loaded.
pub struct TokenCounter {
    bpe: Option<Arc<CoreBPE>>,
    cache: Cache<u64, usize>,
}

impl TokenCounter {
    pub fn new(cache_capacity: u64) -> Self {
        let bpe = match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(Arc::new(bpe)),
            Err(e) => {
                warn!(error = %e, "cl100k_base unavailable, estimating tokens from length");
                None
            }
        };
        Self {
            bpe,
            cache: Cache::new(cache_capacity),
        }
    }

    /// Count tokens (uncached).
    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => estimate(text),
        }
    }

    pub fn count_cached(&self, text: &str) -> usize {
        let mut h = FxHasher::default();
        text.hash(&mut h);
        self.cache.get_with(h.finish(), || self.count(text))
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// `ceil(chars / CHARS_PER_TOKEN)`.
pub fn estimate(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate(""), 0);
        assert_eq!(estimate("abcd"), 1);
        assert_eq!(estimate("abcde"), 2);
    }

    #[test]
    fn cached_count_matches_uncached() {
        let counter = TokenCounter::new(16);
        let text = "fn main() { println!(\"hello\"); }";
        assert_eq!(counter.count_cached(text), counter.count(text));
        assert_eq!(counter.count_cached(text), counter.count(text));
        assert!(counter.count(text) > 0);
    }
}
