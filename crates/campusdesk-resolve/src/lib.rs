//! CampusDesk Resolve: query intent and two-stage, unit-aware retrieval
//! over a [`campusdesk_store::VectorStore`].

pub mod engine;
pub mod intent;
pub mod types;

pub use engine::RetrievalEngine;
pub use intent::{classify_intent, Intent};
pub use types::*;
