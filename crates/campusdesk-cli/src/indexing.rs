//! Pipeline steps: raw pages to chunk artifact, artifact to collection.

use std::path::Path;

use tracing::info;

use campusdesk_core::{CampusConfig, Result};
use campusdesk_infer::create_embedder;
use campusdesk_ingest::{load_raw_documents, read_chunks, write_chunks, ChunkBuilder};
use campusdesk_store::{Chunk, SqliteCollection};

/// Chunks embedded and written per transaction.
pub const BATCH_SIZE: usize = 50;

/// Clean, extract and chunk every scraped page, then write the artifact.
/// Returns the number of chunks written.
pub fn process(config: &CampusConfig) -> Result<usize> {
    let raw = load_raw_documents(&config.data_paths.root, config.chunking.min_content_chars)?;
    let chunks = ChunkBuilder::from_config(config).run(&raw);
    write_chunks(&config.data_paths.chunks_file, &chunks)?;
    info!("Chunks saved to {}", config.data_paths.chunks_file.display());
    Ok(chunks.len())
}

/// Recreate the collection and fill it from the chunk artifact.
pub fn index(config: &CampusConfig) -> Result<usize> {
    let chunks = read_chunks(&config.data_paths.chunks_file)?;
    info!("Loaded {} chunks", chunks.len());

    let collection = SqliteCollection::recreate(
        &config.data_paths.vectordb,
        &config.collection_name,
        create_embedder(config.embedding_dim),
    )?;
    add_in_batches(&collection, &chunks)
}

/// Add `chunks` in order, [`BATCH_SIZE`] at a time.
pub fn add_in_batches(collection: &SqliteCollection, chunks: &[Chunk]) -> Result<usize> {
    let total = chunks.len();
    let mut written = 0;
    for batch in chunks.chunks(BATCH_SIZE) {
        written += collection.add(batch)?;
        info!("Indexed {}/{}", written, total);
    }
    info!("Collection '{}' holds {} chunks", collection.name(), collection.count()?);
    Ok(written)
}

/// Open the indexed collection for querying.
pub fn open_collection(config: &CampusConfig) -> Result<SqliteCollection> {
    SqliteCollection::open(
        &config.data_paths.vectordb,
        &config.collection_name,
        create_embedder(config.embedding_dim),
    )
}

pub fn artifact_exists(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use campusdesk_core::Error;
    use campusdesk_store::VectorStore;
    use serde_json::json;

    fn config(dir: &Path) -> CampusConfig {
        let mut config = CampusConfig::from_env(dir).unwrap();
        config.embedding_dim = 64;
        config.collection_name = "test_campus".into();
        config.directory_department = "admin".into();
        config
    }

    fn scraped(dir: &Path, department: &str, url: &str, content: &str) {
        let dept_dir = dir.join(department);
        fs::create_dir_all(&dept_dir).unwrap();
        let items = json!([{
            "url": url,
            "scraped": {"success": true, "content": content},
        }]);
        let file = dept_dir.join(format!("{}.information.json", department));
        fs::write(file, serde_json::to_string(&items).unwrap()).unwrap();
    }

    #[test]
    fn test_process_then_index() {
        let dir = tempfile::tempdir().unwrap();
        scraped(
            dir.path(),
            "admin",
            "https://admin.example.edu/building",
            "行政大樓\n1樓\n106\n註冊組\nRegistrar\n108\n課務組\nCurriculum Division\n2樓\n201\n秘書室\nSecretariat",
        );
        scraped(
            dir.path(),
            "aca",
            "https://aca.example.edu/registrar",
            "註冊組辦理學籍、成績與畢業證書等業務，並受理在學證明與休學申請。請於週一至週五上班時間前往辦理，逾時恕不受理。",
        );
        let config = config(dir.path());

        let written = process(&config).unwrap();
        assert!(artifact_exists(&config.data_paths.chunks_file));
        // Three offices, one directory window, one enriched service window.
        assert_eq!(written, 5);

        assert_eq!(index(&config).unwrap(), written);
        let collection = open_collection(&config).unwrap();
        assert_eq!(collection.count().unwrap(), written);
        assert!(!collection.query("註冊組", 3, None).unwrap().is_empty());
    }

    #[test]
    fn test_index_without_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(index(&config(dir.path())), Err(Error::Ingest(_))));
    }

    #[test]
    fn test_reindex_with_new_dimension() {
        let dir = tempfile::tempdir().unwrap();
        scraped(
            dir.path(),
            "aca",
            "https://aca.example.edu/leave",
            "休學申請須由學生本人填寫申請表，經系所主管簽章後送註冊組辦理，並依規定繳回學生證。如有疑問請洽教務處註冊組承辦人員。",
        );
        let mut config = config(dir.path());
        process(&config).unwrap();
        index(&config).unwrap();

        config.embedding_dim = 32;
        assert!(matches!(open_collection(&config), Err(Error::DimensionMismatch { .. })));
        assert!(index(&config).is_ok());
        assert_eq!(open_collection(&config).unwrap().dimension(), 32);
    }

    #[test]
    fn test_batches_preserve_count() {
        let dir = tempfile::tempdir().unwrap();
        let collection = SqliteCollection::open(dir.path(), "batches", create_embedder(16)).unwrap();
        let chunks: Vec<Chunk> = (0..BATCH_SIZE * 2 + 7)
            .map(|i| {
                Chunk::new(
                    format!("第{}段", i),
                    campusdesk_store::ChunkMetadata::document(
                        "t",
                        "u",
                        "aca",
                        campusdesk_store::ChunkType::General,
                    ),
                )
            })
            .collect();

        assert_eq!(add_in_batches(&collection, &chunks).unwrap(), chunks.len());
        assert_eq!(collection.count().unwrap(), chunks.len());
    }
}
