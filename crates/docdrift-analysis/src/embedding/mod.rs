//! Embedding providers usable by the mapper's semantic strategy.

mod tfidf;

pub use tfidf::TfIdfEmbedder;
