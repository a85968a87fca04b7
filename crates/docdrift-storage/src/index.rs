//! SQLite-backed codebase index and co-change history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use docdrift_core::constants::DOC_EXTENSIONS;
use docdrift_core::errors::StorageError;
use docdrift_core::models::{CoChange, CodeEntity, EntityType, RepoManifest};
use docdrift_core::traits::{CoChangeSource, CodebaseIndex};
use tracing::debug;

use crate::connection::writer::with_immediate_transaction;
use crate::connection::DatabaseManager;
use crate::queries::{co_changes, index as q};

/// [`CodebaseIndex`] and [`CoChangeSource`] over a [`DatabaseManager`].
///
/// Also exposes the ingestion side used by indexers: files, entities,
/// manifests and commits.
#[derive(Clone)]
pub struct SqliteIndex {
    db: Arc<DatabaseManager>,
}

impl SqliteIndex {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Arc<DatabaseManager> {
        &self.db
    }

    pub fn add_file(
        &self,
        repo_id: &str,
        path: &str,
        content: Option<&str>,
    ) -> Result<(), StorageError> {
        self.db
            .with_writer(|conn| q::upsert_file(conn, repo_id, path, content))
    }

    pub fn remove_file(&self, repo_id: &str, path: &str) -> Result<(), StorageError> {
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| q::remove_file(tx, repo_id, path))
        })
    }

    pub fn add_entities(&self, entities: &[CodeEntity]) -> Result<(), StorageError> {
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                for e in entities {
                    q::upsert_entity(tx, e)?;
                }
                Ok(())
            })
        })
    }

    pub fn add_manifest(&self, repo_id: &str, manifest: &RepoManifest) -> Result<(), StorageError> {
        self.db
            .with_writer(|conn| q::upsert_manifest(conn, repo_id, manifest))
    }

    /// Record every (code file, doc file) pair touched by one commit.
    /// Returns the number of new co-change rows.
    pub fn record_commit(
        &self,
        repo_id: &str,
        commit_sha: &str,
        committed_at: DateTime<Utc>,
        changed_files: &[String],
    ) -> Result<usize, StorageError> {
        let (docs, code): (Vec<&String>, Vec<&String>) =
            changed_files.iter().partition(|f| is_doc_file(f));
        if docs.is_empty() || code.is_empty() {
            return Ok(0);
        }
        let inserted = self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                let mut n = 0;
                for doc in &docs {
                    for code_file in &code {
                        let row = CoChange {
                            repo_id: repo_id.to_string(),
                            code_file: (*code_file).clone(),
                            doc_file: (*doc).clone(),
                            commit_sha: commit_sha.to_string(),
                            committed_at,
                        };
                        if co_changes::insert(tx, &row)? {
                            n += 1;
                        }
                    }
                }
                Ok(n)
            })
        })?;
        debug!(repo_id, commit_sha, inserted, "recorded co-changes");
        Ok(inserted)
    }
}

/// Whether a path looks like documentation by extension.
pub fn is_doc_file(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| DOC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl CodebaseIndex for SqliteIndex {
    fn file_exists(&self, repo_id: &str, path: &str) -> Result<bool, StorageError> {
        self.db.with_reader(|conn| q::file_exists(conn, repo_id, path))
    }

    fn directory_exists(&self, repo_id: &str, dir: &str) -> Result<bool, StorageError> {
        self.db.with_reader(|conn| q::directory_exists(conn, repo_id, dir))
    }

    fn files_with_suffix(&self, repo_id: &str, suffix: &str) -> Result<Vec<String>, StorageError> {
        self.db
            .with_reader(|conn| q::files_with_suffix(conn, repo_id, suffix))
    }

    fn find_entities(
        &self,
        repo_id: &str,
        name: &str,
        prefix: bool,
    ) -> Result<Vec<CodeEntity>, StorageError> {
        self.db
            .with_reader(|conn| q::find_entities(conn, repo_id, name, prefix))
    }

    fn entities_in_file(&self, repo_id: &str, path: &str) -> Result<Vec<CodeEntity>, StorageError> {
        self.db
            .with_reader(|conn| q::entities_in_file(conn, repo_id, path))
    }

    fn entities_of_type(
        &self,
        repo_id: &str,
        entity_type: EntityType,
    ) -> Result<Vec<CodeEntity>, StorageError> {
        self.db
            .with_reader(|conn| q::entities_of_type(conn, repo_id, entity_type))
    }

    fn search_semantic(
        &self,
        repo_id: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(CodeEntity, f64)>, StorageError> {
        self.db
            .with_reader(|conn| q::search_semantic(conn, repo_id, embedding, top_k))
    }

    fn manifests(&self, repo_id: &str) -> Result<Vec<RepoManifest>, StorageError> {
        self.db.with_reader(|conn| q::manifests(conn, repo_id))
    }

    fn file_content(&self, repo_id: &str, path: &str) -> Result<Option<String>, StorageError> {
        self.db.with_reader(|conn| q::file_content(conn, repo_id, path))
    }
}

impl CoChangeSource for SqliteIndex {
    fn co_change_count(
        &self,
        repo_id: &str,
        code_file: &str,
        doc_file: &str,
    ) -> Result<u32, StorageError> {
        self.db
            .with_reader(|conn| co_changes::count(conn, repo_id, code_file, doc_file))
    }
}

#[cfg(test)]
mod tests {
    use super::is_doc_file;

    #[test]
    fn doc_detection_by_extension() {
        assert!(is_doc_file("README.md"));
        assert!(is_doc_file("docs/guide.RST"));
        assert!(!is_doc_file("src/main.rs"));
        assert!(!is_doc_file("Makefile"));
    }
}
