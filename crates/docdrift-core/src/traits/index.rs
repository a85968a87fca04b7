//! Read-only view of the indexed repository.

use crate::errors::StorageError;
use crate::models::{CodeEntity, EntityType, RepoManifest};

/// Queries the mapper and verifier run against a repository's code index.
///
/// All paths are repo-relative with forward slashes.
pub trait CodebaseIndex: Send + Sync {
    fn file_exists(&self, repo_id: &str, path: &str) -> Result<bool, StorageError>;

    /// Whether any indexed file lives under `dir`.
    fn directory_exists(&self, repo_id: &str, dir: &str) -> Result<bool, StorageError>;

    /// Files whose path ends with `/{suffix}` or equals `suffix`.
    fn files_with_suffix(&self, repo_id: &str, suffix: &str) -> Result<Vec<String>, StorageError>;

    /// Entities named exactly `name`, or starting with it when `prefix` is set.
    fn find_entities(
        &self,
        repo_id: &str,
        name: &str,
        prefix: bool,
    ) -> Result<Vec<CodeEntity>, StorageError>;

    fn entities_in_file(&self, repo_id: &str, path: &str) -> Result<Vec<CodeEntity>, StorageError>;

    fn entities_of_type(
        &self,
        repo_id: &str,
        entity_type: EntityType,
    ) -> Result<Vec<CodeEntity>, StorageError>;

    /// Top-k entities by cosine similarity to `embedding`, best first.
    fn search_semantic(
        &self,
        repo_id: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(CodeEntity, f64)>, StorageError>;

    fn manifests(&self, repo_id: &str) -> Result<Vec<RepoManifest>, StorageError>;

    /// Full text of an indexed file, if stored.
    fn file_content(&self, repo_id: &str, path: &str) -> Result<Option<String>, StorageError>;
}
