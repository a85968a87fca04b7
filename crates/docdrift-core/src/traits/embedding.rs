use crate::errors::MappingError;

/// Embedding generation provider.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, MappingError>;

    /// Embed a batch of texts.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MappingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}
