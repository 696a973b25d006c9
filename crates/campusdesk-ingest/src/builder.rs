//! Chunk construction: raw pages in, ordered retrieval chunks out.
//!
//! 1. Every raw page is cleaned.
//! 2. Office records from the directory department's building pages are
//!    collected into a [`LocationIndex`]. This completes before step 3.
//! 3. Pages from other departments that mention a known office get a
//!    supplementary location note; every page is split into windows, and
//!    directory pages additionally yield one location chunk per office.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info};

use campusdesk_core::{CampusConfig, ChunkSettings};
use campusdesk_store::{Chunk, ChunkMetadata};

use crate::chunking::RecursiveChunker;
use crate::clean::{clean, SUPPLEMENT_MARKER};
use crate::extract::{
    classify_chunk_type, detect_building, detect_unit_name, extract_offices, has_floor_structure,
    normalize, OfficeRecord, UnitKey,
};
use crate::source::RawDocument;

/// A page after [`clean`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedDocument {
    pub url: String,
    pub department: String,
    pub title: Option<String>,
    pub text: String,
}

impl CleanedDocument {
    pub fn from_raw(raw: &RawDocument) -> Self {
        Self {
            url: raw.url.clone(),
            department: raw.department.clone(),
            title: raw.title.clone(),
            text: clean(&raw.content, &raw.department),
        }
    }

    /// The scraped title, or the first non-empty line of the text.
    pub fn title(&self) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or_else(|| self.text.lines().map(str::trim).find(|l| !l.is_empty()))
            .unwrap_or_default()
            .to_string()
    }

    /// Office records, if this page is a building directory.
    pub fn offices(&self) -> Vec<OfficeRecord> {
        match detect_building(&self.text) {
            Some(building) if has_floor_structure(&self.text) => {
                extract_offices(&self.text, building)
            }
            _ => Vec::new(),
        }
    }
}

/// Where each known office is, keyed both by its listed Chinese name and
/// by its [`UnitKey`].
#[derive(Debug, Clone, Default)]
pub struct LocationIndex {
    by_name: BTreeMap<String, String>,
    by_key: HashMap<UnitKey, String>,
}

impl LocationIndex {
    /// Index the offices of every `directory_department` page.
    pub fn build(documents: &[CleanedDocument], directory_department: &str) -> Self {
        let mut index = Self::default();
        for doc in documents.iter().filter(|d| d.department == directory_department) {
            for office in doc.offices() {
                index.insert(&office);
            }
        }
        index
    }

    /// Later records for the same office replace earlier ones.
    pub fn insert(&mut self, office: &OfficeRecord) {
        let location = office.location();
        let key = normalize(&office.name_zh);
        if !key.is_empty() {
            self.by_key.insert(key, location.clone());
        }
        self.by_name.insert(office.name_zh.clone(), location);
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Location of the office listed exactly as `name_zh`.
    pub fn get(&self, name_zh: &str) -> Option<&str> {
        self.by_name.get(name_zh).map(String::as_str)
    }

    /// Location of any spelling of `unit_name` that normalizes to a known key.
    pub fn lookup(&self, unit_name: &str) -> Option<&str> {
        self.by_key.get(&normalize(unit_name)).map(String::as_str)
    }

    /// Append a supplementary note listing where each mentioned office is.
    pub fn enrich(&self, text: &str) -> String {
        let lines: BTreeSet<String> = self
            .by_name
            .iter()
            .filter(|(name, _)| text.contains(name.as_str()))
            .map(|(name, location)| format!("{}位置：{}", name, location))
            .collect();
        if lines.is_empty() {
            return text.to_string();
        }
        let notes: Vec<String> = lines.into_iter().collect();
        format!("{}\n\n{}\n{}", text, SUPPLEMENT_MARKER, notes.join("\n"))
    }
}

/// Turns raw pages into the ordered chunk artifact.
pub struct ChunkBuilder {
    chunker: RecursiveChunker,
    directory_department: String,
}

impl ChunkBuilder {
    pub fn new(settings: &ChunkSettings, directory_department: impl Into<String>) -> Self {
        Self {
            chunker: RecursiveChunker::from_settings(settings),
            directory_department: directory_department.into(),
        }
    }

    pub fn from_config(config: &CampusConfig) -> Self {
        Self::new(&config.chunking, config.directory_department.clone())
    }

    pub fn clean_documents(&self, raw: &[RawDocument]) -> Vec<CleanedDocument> {
        raw.iter().map(CleanedDocument::from_raw).collect()
    }

    pub fn build_location_index(&self, documents: &[CleanedDocument]) -> LocationIndex {
        let index = LocationIndex::build(documents, &self.directory_department);
        info!("Location map built with {} offices", index.len());
        index
    }

    /// Build chunks for already-cleaned pages against a complete index.
    pub fn build(&self, documents: &[CleanedDocument], index: &LocationIndex) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut location_count = 0;

        for doc in documents {
            let is_directory = doc.department == self.directory_department;
            let text = if is_directory {
                doc.text.clone()
            } else {
                index.enrich(&doc.text)
            };

            if is_directory && text.contains("- ") {
                let located = self.location_chunks(doc);
                location_count += located.len();
                chunks.extend(located);
            }
            chunks.extend(self.content_chunks(doc, &text));
        }

        info!(
            "Total chunks created: {} (including {} location chunks)",
            chunks.len(),
            location_count
        );
        chunks
    }

    /// Clean, index, then build.
    pub fn run(&self, raw: &[RawDocument]) -> Vec<Chunk> {
        let documents = self.clean_documents(raw);
        let index = self.build_location_index(&documents);
        self.build(&documents, &index)
    }

    fn location_chunks(&self, doc: &CleanedDocument) -> Vec<Chunk> {
        let offices = doc.offices();
        if let Some(first) = offices.first() {
            info!("Created {} location chunks for {}", offices.len(), first.building);
        }
        offices
            .iter()
            .map(|office| location_chunk(office, &doc.url, &doc.department))
            .collect()
    }

    fn content_chunks(&self, doc: &CleanedDocument, text: &str) -> Vec<Chunk> {
        let title = doc.title();
        let unit = detect_unit_name(&title)
            .or_else(|| detect_unit_name(text))
            .map(|name| {
                let key = normalize(&name).into_string();
                (name, key)
            });

        let windows = self.chunker.chunk(text);
        debug!("{} -> {} windows", doc.url, windows.len());

        windows
            .into_iter()
            .map(|window| {
                let mut metadata = ChunkMetadata::document(
                    title.clone(),
                    doc.url.clone(),
                    doc.department.clone(),
                    classify_chunk_type(&window),
                );
                if let Some((name, key)) = &unit {
                    metadata = metadata.with_unit(name.clone(), key.clone());
                }
                Chunk::new(format!("【位於：{}】\n{}", title, window), metadata)
            })
            .collect()
    }
}

/// Self-contained chunk describing where one office is, phrased both as
/// labelled fields and as sentences.
pub fn location_chunk(office: &OfficeRecord, url: &str, department: &str) -> Chunk {
    let OfficeRecord { building, floor, room, name_zh, name_en } = office;

    let mut text = format!("【{name_zh}位置資訊】\n{name_zh}\n");
    if let Some(en) = name_en {
        text.push_str(&format!("英文名稱：{en}\n"));
    }
    text.push_str(&format!(
        "位置：{building} {floor} {room}室\n\
         建築物：{building}\n\
         樓層：{floor}\n\
         房間號碼：{room}\n\
         \n\
         {name_zh}位於{building}{floor}的{room}室。\n\
         如需前往{name_zh}，請至{building}{floor}找{room}室。"
    ));
    if let Some(en) = name_en {
        text.push_str(&format!("\n{en} is located at Room {room}, {floor}, {building}."));
    }

    let metadata = ChunkMetadata::location(format!("{name_zh}位置"), url, department, office.place())
        .with_unit(name_zh.clone(), normalize(name_zh).into_string());
    Chunk::new(text, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use campusdesk_store::ChunkType;

    const DIRECTORY: &str = "行政大樓 Administration Building\n單位清單 / Offices list\n1樓\n106\n註冊組\nRegistrar\n108\n課務組\nCurriculum Division\n2樓\n201\n秘書室\nSecretariat";

    fn raw(url: &str, department: &str, title: Option<&str>, content: &str) -> RawDocument {
        RawDocument {
            url: url.into(),
            department: department.into(),
            title: title.map(str::to_string),
            content: content.into(),
        }
    }

    fn builder() -> ChunkBuilder {
        ChunkBuilder::new(&ChunkSettings::default(), "admin")
    }

    #[test]
    fn test_directory_page_yields_location_chunks() {
        let chunks = builder().run(&[raw("https://x/admin", "admin", None, DIRECTORY)]);
        let locations: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.metadata.chunk_type == ChunkType::Location)
            .collect();
        assert_eq!(locations.len(), 3);

        let registrar = locations[0];
        assert_eq!(registrar.metadata.title, "註冊組位置");
        assert_eq!(registrar.metadata.unit_id.as_deref(), Some("註冊組"));
        assert_eq!(registrar.metadata.building.as_deref(), Some("行政大樓"));
        assert_eq!(registrar.metadata.floor.as_deref(), Some("1樓"));
        assert_eq!(registrar.metadata.room.as_deref(), Some("106"));
        assert!(registrar.text.contains("註冊組位於行政大樓1樓的106室。"));
        assert!(registrar.text.contains("Registrar is located at Room 106, 1樓, 行政大樓."));
        assert_eq!(locations[2].metadata.floor.as_deref(), Some("2樓"));
    }

    #[test]
    fn test_location_chunks_only_from_directory_department() {
        let chunks = builder().run(&[raw("https://x/aca", "aca", None, DIRECTORY)]);
        assert!(chunks.iter().all(|c| c.metadata.chunk_type != ChunkType::Location));
    }

    #[test]
    fn test_other_pages_are_enriched() {
        let chunks = builder().run(&[
            raw("https://x/admin", "admin", None, DIRECTORY),
            raw("https://x/aca", "aca", Some("教務處註冊組"), "註冊組辦理學生證補發與在學證明申請。"),
        ]);
        let aca: Vec<&Chunk> = chunks.iter().filter(|c| c.metadata.department == "aca").collect();
        assert_eq!(aca.len(), 1);
        assert!(aca[0].text.starts_with("【位於：教務處註冊組】\n"));
        assert!(aca[0].text.contains("【系統補充位置資訊】\n註冊組位置：行政大樓 1樓 106室"));
        assert_eq!(aca[0].metadata.unit_name.as_deref(), Some("教務處註冊組"));
        assert_eq!(aca[0].metadata.chunk_type, ChunkType::Service);

        // Directory pages are not annotated with their own listing.
        assert!(chunks
            .iter()
            .filter(|c| c.metadata.department == "admin")
            .all(|c| !c.text.contains(SUPPLEMENT_MARKER)));
    }

    #[test]
    fn test_every_chunk_respects_location_invariant() {
        let chunks = builder().run(&[
            raw("https://x/admin", "admin", None, DIRECTORY),
            raw("https://x/aca", "aca", None, "課務組負責排課，電話分機 2211。"),
        ]);
        assert!(chunks.iter().all(|c| c.metadata.is_consistent()));
        let phone = chunks.iter().find(|c| c.metadata.department == "aca").unwrap();
        assert_eq!(phone.metadata.chunk_type, ChunkType::Phone);
        assert_eq!(phone.metadata.unit_id.as_deref(), Some("課務組"));
    }

    #[test]
    fn test_title_falls_back_to_first_line() {
        let doc = CleanedDocument::from_raw(&raw("u", "aca", Some("  "), "\n第一行\n第二行"));
        assert_eq!(doc.title(), "第一行");
    }

    #[test]
    fn test_enriched_text_cleans_back() {
        let mut index = LocationIndex::default();
        index.insert(&OfficeRecord {
            building: "行政大樓".into(),
            floor: "1樓".into(),
            room: "106".into(),
            name_zh: "註冊組".into(),
            name_en: None,
        });
        let cleaned = clean("請洽註冊組辦理。", "aca");
        let enriched = index.enrich(&cleaned);
        assert_ne!(enriched, cleaned);
        assert_eq!(clean(&enriched, "aca"), cleaned);
        assert_eq!(index.get("註冊組"), Some("行政大樓 1樓 106室"));
        assert_eq!(index.lookup("註冊 組"), Some("行政大樓 1樓 106室"));
        assert_eq!(index.enrich("無關內容"), "無關內容");
    }
}
