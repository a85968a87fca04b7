use crate::errors::StorageError;

/// Source of historical co-change counts between code and doc files.
pub trait CoChangeSource: Send + Sync {
    /// Number of commits that touched both `code_file` and `doc_file`.
    fn co_change_count(
        &self,
        repo_id: &str,
        code_file: &str,
        doc_file: &str,
    ) -> Result<u32, StorageError>;
}
