//! Versioned schema migrations tracked through `PRAGMA user_version`.

pub mod v001_index;
pub mod v002_claims;
pub mod v003_agent_tasks;
pub mod v004_suppression;
pub mod v005_scan_run_claims;

use docdrift_core::errors::StorageError;
use rusqlite::Connection;
use tracing::info;

/// Ordered `(version, sql)` pairs. Versions must be contiguous from 1.
const MIGRATIONS: &[(u32, &str)] = &[
    (1, v001_index::MIGRATION_SQL),
    (2, v002_claims::MIGRATION_SQL),
    (3, v003_agent_tasks::MIGRATION_SQL),
    (4, v004_suppression::MIGRATION_SQL),
    (5, v005_scan_run_claims::MIGRATION_SQL),
];

/// Latest schema version.
pub const LATEST_VERSION: u32 = 5;

/// Current `user_version` of the database.
pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
    conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))
        .map_err(StorageError::sqlite)
}

/// Apply every migration newer than the database's `user_version`.
/// Each migration runs in its own transaction together with the version bump.
pub fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    let current = current_version(conn)?;
    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StorageError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        tx.execute_batch(sql)
            .and_then(|_| tx.pragma_update(None, "user_version", version))
            .map_err(|e| StorageError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        tx.commit().map_err(|e| StorageError::MigrationFailed {
            version,
            reason: e.to_string(),
        })?;
        info!(version, "applied migration");
    }
    Ok(())
}
