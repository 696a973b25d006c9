//! The vector-store contract the retrieval engine reads through.

use crate::types::{QueryFilter, RetrievalResult};
use campusdesk_core::Result;

/// Similarity search over indexed chunks.
///
/// Implementations embed `text` with the embedding function bound at
/// construction, restrict candidates to those matching every condition of
/// `filter`, and return at most `top_n` entries ordered by ascending
/// distance. An empty collection yields an empty result, not an error.
pub trait VectorStore: Send + Sync {
    fn query(&self, text: &str, top_n: usize, filter: Option<&QueryFilter>)
        -> Result<RetrievalResult>;
}
