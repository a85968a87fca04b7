//! # docdrift-storage
//!
//! SQLite persistence for DocDrift: a serialized writer plus a read pool,
//! versioned migrations, per-table query modules, and [`SqliteIndex`], the
//! SQLite-backed [`CodebaseIndex`](docdrift_core::traits::CodebaseIndex).

pub mod connection;
pub mod index;
pub mod migrations;
pub mod queries;

pub use connection::DatabaseManager;
pub use index::SqliteIndex;
