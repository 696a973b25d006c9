//! CampusDesk Store: chunk types, the vector-store contract and the
//! SQLite-backed collection that implements it.

pub mod embedding;
pub mod schema;
pub mod sqlite;
pub mod types;
pub mod vector_store;

pub use sqlite::SqliteCollection;
pub use types::*;
pub use vector_store::VectorStore;
