//! CampusDesk Infer: embedding contract, hashing embedder, query cache.
//!
//! The embedding model is an external collaborator consumed through
//! `EmbedderBackend`. `HashingEmbedder` is the built-in deterministic
//! backend used for offline indexing and tests.

pub mod cache;
pub mod embedder;
pub mod hashing;

pub use cache::QueryCache;
pub use embedder::{normalize_l2, EmbedderBackend};
pub use hashing::HashingEmbedder;

use std::sync::Arc;

/// Create the embedder used by the command-line tools.
pub fn create_embedder(dimension: usize) -> Arc<dyn EmbedderBackend> {
    tracing::info!("Using hashing embedder (dim={})", dimension);
    Arc::new(HashingEmbedder::new(dimension))
}
