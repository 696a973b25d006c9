//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Department whose pages are the authoritative building directory.
pub const DEFAULT_DIRECTORY_DEPARTMENT: &str = "admin";
/// Default vector collection name.
pub const DEFAULT_COLLECTION: &str = "campus_assistant";
/// Embedding dimension of the default collection (bge-m3 sized).
pub const DEFAULT_EMBEDDING_DIM: usize = 1024;

/// Paths to all CampusDesk data locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory; scraped `*.information.json` files live below it,
    /// one sub-directory per department.
    pub root: PathBuf,
    /// Chunk artifact consumed by the indexing step (`data/processed_chunks.json`).
    pub chunks_file: PathBuf,
    /// Vector database directory (`data/vectordb/`).
    pub vectordb: PathBuf,
    /// Answer-generation configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            chunks_file: root.join("processed_chunks.json"),
            vectordb: root.join("vectordb"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        std::fs::create_dir_all(&paths.vectordb)?;
        Ok(paths)
    }
}

/// Sliding-window chunking parameters, measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Split points in preference order: paragraphs, lines, then sentences.
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
    /// Documents whose scraped content is shorter than this are skipped.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
}

fn default_chunk_size() -> usize {
    600
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_separators() -> Vec<String> {
    ["\n\n", "\n", "。", "！", "？", ".", "!", "?", " "]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_min_content_chars() -> usize {
    50
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
            min_content_chars: default_min_content_chars(),
        }
    }
}

/// Result sizes and guards used by the retrieval engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Broad first-stage lookup size.
    #[serde(default = "default_stage1_top_n")]
    pub stage1_top_n: usize,
    /// Lookup size when no unit can be resolved; leaves room for reranking.
    #[serde(default = "default_single_stage_top_n")]
    pub single_stage_top_n: usize,
    /// Per-unit lookup size and the size of the merged stage-2 set.
    #[serde(default = "default_stage2_top_n")]
    pub stage2_top_n: usize,
    /// Results kept after reranking.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Location chunks appended per resolved unit.
    #[serde(default = "default_locations_per_unit")]
    pub locations_per_unit: usize,
    /// Characters of chunk text that take part in the dedup fingerprint.
    #[serde(default = "default_fingerprint_chars")]
    pub fingerprint_chars: usize,
    /// Unit ids longer than this are treated as corrupted.
    #[serde(default = "default_max_unit_id_chars")]
    pub max_unit_id_chars: usize,
}

fn default_stage1_top_n() -> usize {
    5
}
fn default_single_stage_top_n() -> usize {
    15
}
fn default_stage2_top_n() -> usize {
    10
}
fn default_top_k() -> usize {
    5
}
fn default_locations_per_unit() -> usize {
    2
}
fn default_fingerprint_chars() -> usize {
    80
}
fn default_max_unit_id_chars() -> usize {
    50
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            stage1_top_n: default_stage1_top_n(),
            single_stage_top_n: default_single_stage_top_n(),
            stage2_top_n: default_stage2_top_n(),
            top_k: default_top_k(),
            locations_per_unit: default_locations_per_unit(),
            fingerprint_chars: default_fingerprint_chars(),
            max_unit_id_chars: default_max_unit_id_chars(),
        }
    }
}

/// Top-level CampusDesk configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampusConfig {
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Vector collection holding the indexed chunks.
    pub collection_name: String,
    /// Dimension the collection is created with.
    pub embedding_dim: usize,
    /// Department whose pages list building → floor → office.
    pub directory_department: String,
    pub chunking: ChunkSettings,
    pub retrieval: RetrievalSettings,
}

impl CampusConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let collection_name = std::env::var("CAMPUSDESK_COLLECTION")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        let embedding_dim = std::env::var("CAMPUSDESK_EMBEDDING_DIM")
            .ok()
            .and_then(|d| d.parse().ok())
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_EMBEDDING_DIM);

        let directory_department = std::env::var("CAMPUSDESK_DIRECTORY_DEPT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DIRECTORY_DEPARTMENT.to_string());

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            data_paths,
            collection_name,
            embedding_dim,
            directory_department,
            chunking: ChunkSettings::default(),
            retrieval: RetrievalSettings::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_paths_layout() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path()).unwrap();
        assert!(paths.vectordb.is_dir());
        assert_eq!(paths.chunks_file, dir.path().join("processed_chunks.json"));
        assert_eq!(paths.llm_config_file, dir.path().join("llm-config.json"));
    }

    #[test]
    fn test_retrieval_defaults() {
        let s = RetrievalSettings::default();
        assert_eq!(s.stage1_top_n, 5);
        assert_eq!(s.single_stage_top_n, 15);
        assert_eq!(s.stage2_top_n, 10);
        assert_eq!(s.top_k, 5);
        assert_eq!(s.locations_per_unit, 2);
        assert_eq!(s.fingerprint_chars, 80);
    }

    #[test]
    fn test_partial_settings_deserialize_with_defaults() {
        let s: RetrievalSettings = serde_json::from_str(r#"{"top_k": 8}"#).unwrap();
        assert_eq!(s.top_k, 8);
        assert_eq!(s.stage2_top_n, 10);

        let c: ChunkSettings = serde_json::from_str(r#"{"chunk_size": 300}"#).unwrap();
        assert_eq!(c.chunk_size, 300);
        assert_eq!(c.chunk_overlap, 100);
        assert_eq!(c.separators[0], "\n\n");
    }
}
