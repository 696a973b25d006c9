//! SQLite-backed vector collection.
//!
//! Chunks, their metadata and uint8-quantized embeddings are persisted per
//! named collection. Searches run against an in-memory matrix of normalized
//! embeddings that is reloaded lazily after writes. Distance is cosine
//! distance (`1 - cos`), so smaller is closer.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{Array1, Array2};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::embedding::QuantizedVector;
use crate::schema::SCHEMA_SQL;
use crate::types::{Chunk, ChunkMetadata, QueryFilter, RetrievalResult};
use crate::vector_store::VectorStore;
use campusdesk_core::{Error, Result};
use campusdesk_infer::{normalize_l2, EmbedderBackend, QueryCache};

const DB_FILE: &str = "campusdesk.db";

/// A named collection bound to one embedding function.
pub struct SqliteCollection {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    name: String,
    collection_id: i64,
    dimension: usize,
    embedder: Arc<dyn EmbedderBackend>,
    query_cache: QueryCache,
    index: Mutex<SearchIndex>,
}

struct SearchIndex {
    /// Normalized embeddings, shape (N, dim).
    matrix: Array2<f32>,
    /// Text and metadata for each matrix row.
    rows: Vec<(String, ChunkMetadata)>,
    dirty: bool,
}

impl SqliteCollection {
    /// Open (or create) the collection `name` under `db_dir`.
    ///
    /// Fails with [`Error::DimensionMismatch`] when the collection already
    /// exists with a different embedding dimension than `embedder` produces.
    pub fn open(
        db_dir: impl AsRef<Path>,
        name: &str,
        embedder: Arc<dyn EmbedderBackend>,
    ) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join(DB_FILE);
        let conn = Self::create_connection(&db_path)?;

        let dimension = embedder.dimension();
        let existing: Option<(i64, i64)> = conn
            .query_row(
                "SELECT id, dimension FROM collections WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        let collection_id = match existing {
            Some((id, stored)) => {
                if stored as usize != dimension {
                    return Err(Error::DimensionMismatch {
                        expected: stored as usize,
                        actual: dimension,
                    });
                }
                id
            }
            None => {
                conn.execute(
                    "INSERT INTO collections (name, dimension, embedder, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![name, dimension as i64, embedder.name(), now_millis()],
                )
                .map_err(|e| Error::Database(e.to_string()))?;
                info!("Created collection '{}' (dim={})", name, dimension);
                conn.last_insert_rowid()
            }
        };

        let collection = Self {
            conn: Mutex::new(conn),
            db_path,
            name: name.to_string(),
            collection_id,
            dimension,
            embedder,
            query_cache: QueryCache::default(),
            index: Mutex::new(SearchIndex {
                matrix: Array2::zeros((0, dimension)),
                rows: Vec::new(),
                dirty: true,
            }),
        };

        info!(
            "Collection '{}' opened: {} chunks, dim={}, path={}",
            collection.name,
            collection.count()?,
            dimension,
            collection.db_path.display()
        );
        Ok(collection)
    }

    /// Drop any existing collection called `name` and create it afresh.
    pub fn recreate(
        db_dir: impl AsRef<Path>,
        name: &str,
        embedder: Arc<dyn EmbedderBackend>,
    ) -> Result<Self> {
        if Self::delete(db_dir.as_ref(), name)? {
            info!("Deleted previous collection '{}'", name);
        }
        Self::open(db_dir, name, embedder)
    }

    /// Delete the collection and its chunks. Returns whether it existed.
    pub fn delete(db_dir: impl AsRef<Path>, name: &str) -> Result<bool> {
        let db_path = db_dir.as_ref().join(DB_FILE);
        if !db_path.exists() {
            return Ok(false);
        }
        let conn = Self::create_connection(&db_path)?;
        let count = conn
            .execute("DELETE FROM collections WHERE name = ?1", params![name])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(conn)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of chunks in the collection.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE collection_id = ?1",
                params![self.collection_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count as usize)
    }

    /// Embed and store a batch of chunks, appended after existing ones.
    /// Returns the number of chunks written.
    pub fn add(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Inference(format!(
                "{} returned {} vectors for {} texts",
                self.embedder.name(),
                embeddings.len(),
                chunks.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        let start: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(position), -1) + 1 FROM chunks WHERE collection_id = ?1",
                params![self.collection_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR REPLACE INTO chunks \
                     (id, collection_id, position, text, metadata_json, embedding, scale, bias) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(|e| Error::Database(e.to_string()))?;

            for (offset, (chunk, embedding)) in chunks.iter().zip(&embeddings).enumerate() {
                let position = start + offset as i64;
                let q = QuantizedVector::encode(embedding);
                let meta_json = serde_json::to_string(&chunk.metadata)?;
                stmt.execute(params![
                    chunk_id(position, &chunk.text),
                    self.collection_id,
                    position,
                    chunk.text,
                    meta_json,
                    q.bytes,
                    q.scale as f64,
                    q.offset as f64,
                ])
                .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        drop(conn);

        self.index.lock().dirty = true;
        debug!("Added {} chunks to '{}'", chunks.len(), self.name);
        Ok(chunks.len())
    }

    fn load_index(&self) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT text, metadata_json, embedding, scale, bias FROM chunks \
                 WHERE collection_id = ?1 ORDER BY position",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let raw: Vec<(String, String, Vec<u8>, f64, f64)> = stmt
            .query_map(params![self.collection_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(|r| match r {
                Ok(row) => Some(row),
                Err(e) => {
                    warn!("Skipping unreadable chunk row in '{}': {}", self.name, e);
                    None
                }
            })
            .collect();
        drop(stmt);
        drop(conn);

        let mut rows = Vec::with_capacity(raw.len());
        let mut vectors = Vec::with_capacity(raw.len());
        for (text, meta_json, bytes, scale, bias) in raw {
            if bytes.len() != self.dimension {
                warn!("Skipping chunk with {}-dim embedding in '{}'", bytes.len(), self.name);
                continue;
            }
            let metadata: ChunkMetadata = match serde_json::from_str(&meta_json) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Skipping chunk with unreadable metadata: {}", e);
                    continue;
                }
            };
            let mut v = QuantizedVector {
                bytes,
                scale: scale as f32,
                offset: bias as f32,
            }
            .decode();
            normalize_l2(&mut v);
            vectors.push(v);
            rows.push((text, metadata));
        }

        let mut matrix = Array2::<f32>::zeros((vectors.len(), self.dimension));
        for (i, v) in vectors.iter().enumerate() {
            matrix.row_mut(i).assign(v);
        }

        let mut index = self.index.lock();
        index.matrix = matrix;
        index.rows = rows;
        index.dirty = false;
        debug!("Loaded {} embeddings for '{}'", index.rows.len(), self.name);
        Ok(())
    }

    fn ensure_index_loaded(&self) -> Result<()> {
        if self.index.lock().dirty {
            self.load_index()?;
        }
        Ok(())
    }

    fn embed_query(&self, text: &str) -> Result<Array1<f32>> {
        if let Some(cached) = self.query_cache.get(text) {
            return Ok(cached);
        }
        let mut v = self.embedder.embed(text)?;
        if v.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: v.len(),
            });
        }
        normalize_l2(&mut v);
        self.query_cache.put(text.to_string(), v.clone());
        Ok(v)
    }
}

impl VectorStore for SqliteCollection {
    fn query(
        &self,
        text: &str,
        top_n: usize,
        filter: Option<&QueryFilter>,
    ) -> Result<RetrievalResult> {
        if top_n == 0 {
            return Ok(RetrievalResult::new());
        }
        let q = self.embed_query(text)?;
        self.ensure_index_loaded()?;

        let index = self.index.lock();
        let mut scored: Vec<(usize, f32)> = index
            .rows
            .iter()
            .enumerate()
            .filter(|(_, (_, meta))| filter.map_or(true, |f| f.matches(meta)))
            .map(|(i, _)| (i, (1.0 - index.matrix.row(i).dot(&q)).max(0.0)))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_n);

        let mut result = RetrievalResult::new();
        for (i, distance) in scored {
            let (text, meta) = &index.rows[i];
            result.push(text.clone(), meta.clone(), distance);
        }
        Ok(result)
    }
}

/// Deterministic chunk id: SHA-256 over position and text.
fn chunk_id(position: i64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(position.to_le_bytes());
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
