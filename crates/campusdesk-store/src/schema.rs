//! Database schema SQL for vector collections.

/// `collections` records the embedding dimension fixed at creation time;
/// `chunks` holds text, metadata JSON and the quantized embedding.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    dimension INTEGER NOT NULL,
    embedder TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT NOT NULL,
    collection_id INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    text TEXT NOT NULL,
    metadata_json TEXT NOT NULL,
    embedding BLOB NOT NULL,
    scale REAL NOT NULL,
    bias REAL NOT NULL,
    PRIMARY KEY (collection_id, id)
);

CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection_id, position);
"#;
