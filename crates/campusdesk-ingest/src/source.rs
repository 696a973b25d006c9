//! Scraped input and the persisted chunk artifact.
//!
//! Scraped pages arrive as `*.information.json` files under
//! `<data>/<department>/...`, each a JSON array of
//! `{url, title?, scraped: {success, content}}` items.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use campusdesk_core::{Error, Result};
use campusdesk_store::Chunk;

const RAW_SUFFIX: &str = ".information.json";
const UNKNOWN_DEPARTMENT: &str = "unknown";

/// One successfully scraped page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    pub url: String,
    pub department: String,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ScrapedItem {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    scraped: Scraped,
}

#[derive(Debug, Default, Deserialize)]
struct Scraped {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    content: String,
}

/// Load every scraped page under `data_dir`.
///
/// Failed scrapes and pages with fewer than `min_content_chars` characters
/// of content are skipped. Unreadable files and directories below the root
/// are logged and skipped; symbolic links are not followed.
pub fn load_raw_documents(data_dir: &Path, min_content_chars: usize) -> Result<Vec<RawDocument>> {
    let mut files = collect_raw_files(data_dir)?;
    files.sort();

    let mut documents = Vec::new();
    for path in &files {
        let department = department_for(data_dir, path);
        let items: Vec<ScrapedItem> = match std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|s| serde_json::from_str(&s).map_err(Error::from))
        {
            Ok(items) => items,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let before = documents.len();
        for item in items {
            if !item.scraped.success {
                continue;
            }
            let content = item.scraped.content.trim();
            if content.chars().count() < min_content_chars {
                continue;
            }
            documents.push(RawDocument {
                url: item.url,
                department: department.clone(),
                title: item.title.filter(|t| !t.trim().is_empty()),
                content: content.to_string(),
            });
        }
        debug!(
            "Loaded {} documents from {} ({})",
            documents.len() - before,
            path.display(),
            department
        );
    }

    info!("Loaded {} raw documents from {} files", documents.len(), files.len());
    Ok(documents)
}

fn collect_raw_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(data_dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(std::io::Error::from(e).into()),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file()
            && entry.file_name().to_str().is_some_and(|n| n.ends_with(RAW_SUFFIX))
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// First directory component below the data root.
fn department_for(data_dir: &Path, file: &Path) -> String {
    file.parent()
        .and_then(|parent| parent.strip_prefix(data_dir).ok())
        .and_then(|rel| rel.components().next())
        .and_then(|c| c.as_os_str().to_str())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_DEPARTMENT.to_string())
}

/// Persist the ordered chunk artifact as pretty-printed JSON.
pub fn write_chunks(path: &Path, chunks: &[Chunk]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(chunks)?;
    std::fs::write(path, json)?;
    info!("Wrote {} chunks to {}", chunks.len(), path.display());
    Ok(())
}

pub fn read_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        Error::Ingest(format!("cannot read chunk artifact {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&json)?)
}
