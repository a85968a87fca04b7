//! Queries for the indexed repository view: files, code entities, manifests.

use docdrift_core::errors::StorageError;
use docdrift_core::models::{CodeEntity, EntityType, RepoManifest};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{bytes_to_f32_vec, cosine_similarity, f32_vec_to_bytes, parse_enum, parse_json, to_json};

const ENTITY_COLUMNS: &str =
    "id, repo_id, file_path, start_line, end_line, entity_type, name, signature, raw_code, embedding";

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<CodeEntity> {
    let entity_type: String = row.get(5)?;
    let embedding: Option<Vec<u8>> = row.get(9)?;
    Ok(CodeEntity {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        file_path: row.get(2)?,
        start_line: row.get(3)?,
        end_line: row.get(4)?,
        entity_type: parse_enum(5, &entity_type)?,
        name: row.get(6)?,
        signature: row.get(7)?,
        raw_code: row.get(8)?,
        embedding: embedding.map(|b| bytes_to_f32_vec(&b)),
    })
}

fn query_entities<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<CodeEntity>, StorageError> {
    let mut stmt = conn.prepare_cached(sql).map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params, entity_from_row)
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}

pub fn upsert_file(
    conn: &Connection,
    repo_id: &str,
    path: &str,
    content: Option<&str>,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO repo_files (repo_id, path, content) VALUES (?1, ?2, ?3)
         ON CONFLICT(repo_id, path) DO UPDATE SET content = excluded.content",
        params![repo_id, path, content],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

pub fn remove_file(conn: &Connection, repo_id: &str, path: &str) -> Result<(), StorageError> {
    conn.execute(
        "DELETE FROM code_entities WHERE repo_id = ?1 AND file_path = ?2",
        params![repo_id, path],
    )
    .map_err(StorageError::sqlite)?;
    conn.execute(
        "DELETE FROM repo_files WHERE repo_id = ?1 AND path = ?2",
        params![repo_id, path],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

pub fn upsert_entity(conn: &Connection, entity: &CodeEntity) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO code_entities
            (id, repo_id, file_path, start_line, end_line, entity_type, name, signature, raw_code, embedding)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
            file_path = excluded.file_path, start_line = excluded.start_line,
            end_line = excluded.end_line, entity_type = excluded.entity_type,
            name = excluded.name, signature = excluded.signature,
            raw_code = excluded.raw_code, embedding = excluded.embedding",
        params![
            entity.id,
            entity.repo_id,
            entity.file_path,
            entity.start_line,
            entity.end_line,
            entity.entity_type.as_str(),
            entity.name,
            entity.signature,
            entity.raw_code,
            entity.embedding.as_deref().map(f32_vec_to_bytes),
        ],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

pub fn upsert_manifest(
    conn: &Connection,
    repo_id: &str,
    manifest: &RepoManifest,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO repo_manifests (repo_id, file_path, data) VALUES (?1, ?2, ?3)
         ON CONFLICT(repo_id, file_path) DO UPDATE SET data = excluded.data",
        params![repo_id, manifest.file_path, to_json(manifest)?],
    )
    .map_err(StorageError::sqlite)?;
    Ok(())
}

pub fn file_exists(conn: &Connection, repo_id: &str, path: &str) -> Result<bool, StorageError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM repo_files WHERE repo_id = ?1 AND path = ?2)",
        params![repo_id, path],
        |row| row.get(0),
    )
    .map_err(StorageError::sqlite)
}

pub fn directory_exists(conn: &Connection, repo_id: &str, dir: &str) -> Result<bool, StorageError> {
    let prefix = format!("{}/", dir.trim_end_matches('/'));
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM repo_files
                       WHERE repo_id = ?1 AND substr(path, 1, length(?2)) = ?2)",
        params![repo_id, prefix],
        |row| row.get(0),
    )
    .map_err(StorageError::sqlite)
}

/// Files equal to `suffix` or ending in `/{suffix}`, sorted.
pub fn files_with_suffix(
    conn: &Connection,
    repo_id: &str,
    suffix: &str,
) -> Result<Vec<String>, StorageError> {
    let suffix = suffix.trim_start_matches('/');
    let needle = format!("/{suffix}");
    let mut stmt = conn
        .prepare_cached(
            "SELECT path FROM repo_files
             WHERE repo_id = ?1 AND (path = ?2 OR substr(path, -length(?3)) = ?3)
             ORDER BY path",
        )
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![repo_id, suffix, needle], |row| row.get(0))
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}

pub fn file_content(
    conn: &Connection,
    repo_id: &str,
    path: &str,
) -> Result<Option<String>, StorageError> {
    conn.query_row(
        "SELECT content FROM repo_files WHERE repo_id = ?1 AND path = ?2",
        params![repo_id, path],
        |row| row.get::<_, Option<String>>(0),
    )
    .optional()
    .map(Option::flatten)
    .map_err(StorageError::sqlite)
}

/// Exact name matches, or names starting with `name` when `prefix` is set.
pub fn find_entities(
    conn: &Connection,
    repo_id: &str,
    name: &str,
    prefix: bool,
) -> Result<Vec<CodeEntity>, StorageError> {
    if prefix {
        query_entities(
            conn,
            &format!(
                "SELECT {ENTITY_COLUMNS} FROM code_entities
                 WHERE repo_id = ?1 AND substr(name, 1, length(?2)) = ?2
                 ORDER BY file_path, start_line"
            ),
            params![repo_id, name],
        )
    } else {
        query_entities(
            conn,
            &format!(
                "SELECT {ENTITY_COLUMNS} FROM code_entities
                 WHERE repo_id = ?1 AND name = ?2
                 ORDER BY file_path, start_line"
            ),
            params![repo_id, name],
        )
    }
}

pub fn entities_in_file(
    conn: &Connection,
    repo_id: &str,
    path: &str,
) -> Result<Vec<CodeEntity>, StorageError> {
    query_entities(
        conn,
        &format!(
            "SELECT {ENTITY_COLUMNS} FROM code_entities
             WHERE repo_id = ?1 AND file_path = ?2 ORDER BY start_line"
        ),
        params![repo_id, path],
    )
}

pub fn entities_of_type(
    conn: &Connection,
    repo_id: &str,
    entity_type: EntityType,
) -> Result<Vec<CodeEntity>, StorageError> {
    query_entities(
        conn,
        &format!(
            "SELECT {ENTITY_COLUMNS} FROM code_entities
             WHERE repo_id = ?1 AND entity_type = ?2 ORDER BY file_path, start_line"
        ),
        params![repo_id, entity_type.as_str()],
    )
}

/// Brute-force cosine search over stored entity embeddings.
/// Returns `(entity, similarity)` pairs, best first, positive similarity only.
pub fn search_semantic(
    conn: &Connection,
    repo_id: &str,
    query: &[f32],
    top_k: usize,
) -> Result<Vec<(CodeEntity, f64)>, StorageError> {
    if query.iter().all(|x| *x == 0.0) {
        return Ok(Vec::new());
    }
    let candidates = query_entities(
        conn,
        &format!(
            "SELECT {ENTITY_COLUMNS} FROM code_entities
             WHERE repo_id = ?1 AND embedding IS NOT NULL"
        ),
        params![repo_id],
    )?;

    let mut scored: Vec<(CodeEntity, f64)> = candidates
        .into_iter()
        .filter_map(|e| {
            let sim = e.embedding.as_deref().map(|v| cosine_similarity(query, v))?;
            (sim > 0.0).then_some((e, sim))
        })
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    scored.truncate(top_k);
    Ok(scored)
}

pub fn manifests(conn: &Connection, repo_id: &str) -> Result<Vec<RepoManifest>, StorageError> {
    let mut stmt = conn
        .prepare_cached("SELECT data FROM repo_manifests WHERE repo_id = ?1 ORDER BY file_path")
        .map_err(StorageError::sqlite)?;
    let rows = stmt
        .query_map(params![repo_id], |row| {
            let data: String = row.get(0)?;
            parse_json::<RepoManifest>(0, &data)
        })
        .map_err(StorageError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::sqlite)
}
