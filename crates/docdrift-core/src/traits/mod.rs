//! Collaborator traits. The analysis crate depends only on these seams;
//! `docdrift-storage` provides the SQLite-backed implementations.

pub mod cancellation;
pub mod co_change;
pub mod embedding;
pub mod index;

pub use cancellation::{Cancellable, CancellationToken};
pub use co_change::CoChangeSource;
pub use embedding::EmbeddingProvider;
pub use index::CodebaseIndex;
