//! Chunk, metadata, filter and result types shared by the pipeline, the
//! vector collection and the retrieval engine.

use serde::{Deserialize, Serialize};

/// Coarse content label attached to every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    #[default]
    General,
    Phone,
    Service,
    Location,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Phone => "phone",
            Self::Service => "service",
            Self::Location => "location",
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical place of an office, carried only by location chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub building: String,
    pub floor: String,
    pub room: String,
}

/// Metadata stored next to each chunk.
///
/// Location chunks always carry `building`/`floor`/`room`; other chunk
/// types never do. Use [`ChunkMetadata::document`] and
/// [`ChunkMetadata::location`] to build values that respect this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub title: String,
    pub url: String,
    pub department: String,
    #[serde(rename = "type", default)]
    pub chunk_type: ChunkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl ChunkMetadata {
    /// Metadata for a content chunk cut from a document.
    ///
    /// `Location` is not a document label; it is downgraded to `General`.
    pub fn document(
        title: impl Into<String>,
        url: impl Into<String>,
        department: impl Into<String>,
        chunk_type: ChunkType,
    ) -> Self {
        let chunk_type = match chunk_type {
            ChunkType::Location => ChunkType::General,
            other => other,
        };
        Self {
            title: title.into(),
            url: url.into(),
            department: department.into(),
            chunk_type,
            unit_name: None,
            unit_id: None,
            building: None,
            floor: None,
            room: None,
        }
    }

    /// Metadata for a synthesized office-location chunk.
    pub fn location(
        title: impl Into<String>,
        url: impl Into<String>,
        department: impl Into<String>,
        place: Place,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            department: department.into(),
            chunk_type: ChunkType::Location,
            unit_name: None,
            unit_id: None,
            building: Some(place.building),
            floor: Some(place.floor),
            room: Some(place.room),
        }
    }

    /// Attach the organizational unit the chunk belongs to.
    pub fn with_unit(mut self, unit_name: impl Into<String>, unit_id: impl Into<String>) -> Self {
        let unit_id = unit_id.into();
        self.unit_name = Some(unit_name.into());
        self.unit_id = if unit_id.is_empty() { None } else { Some(unit_id) };
        self
    }

    /// Whether the location fields agree with the chunk type.
    pub fn is_consistent(&self) -> bool {
        let has_place = self.building.is_some() && self.floor.is_some() && self.room.is_some();
        let has_any = self.building.is_some() || self.floor.is_some() || self.room.is_some();
        match self.chunk_type {
            ChunkType::Location => has_place,
            _ => !has_any,
        }
    }

    /// Value of a metadata field, as used by exact-match filters.
    pub fn field(&self, field: MetadataField) -> Option<&str> {
        match field {
            MetadataField::Title => Some(&self.title),
            MetadataField::Url => Some(&self.url),
            MetadataField::Department => Some(&self.department),
            MetadataField::Type => Some(self.chunk_type.as_str()),
            MetadataField::UnitName => self.unit_name.as_deref(),
            MetadataField::UnitId => self.unit_id.as_deref(),
            MetadataField::Building => self.building.as_deref(),
            MetadataField::Floor => self.floor.as_deref(),
            MetadataField::Room => self.room.as_deref(),
        }
    }
}

/// One retrieval unit: text plus metadata. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// Filterable metadata keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    Title,
    Url,
    Department,
    Type,
    UnitName,
    UnitId,
    Building,
    Floor,
    Room,
}

/// Conjunction of exact-match metadata equalities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    conditions: Vec<(MetadataField, String)>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `unit_id = id`
    pub fn unit_id(id: impl Into<String>) -> Self {
        Self::new().and(MetadataField::UnitId, id)
    }

    /// `type = t`
    pub fn chunk_type(t: ChunkType) -> Self {
        Self::new().and(MetadataField::Type, t.as_str())
    }

    pub fn and(mut self, field: MetadataField, value: impl Into<String>) -> Self {
        self.conditions.push((field, value.into()));
        self
    }

    pub fn and_type(self, t: ChunkType) -> Self {
        self.and(MetadataField::Type, t.as_str())
    }

    pub fn conditions(&self) -> &[(MetadataField, String)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// An empty filter matches everything.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| metadata.field(*field) == Some(value.as_str()))
    }
}

/// A single scored chunk taken out of a [`RetrievalResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Non-negative; smaller is closer.
    pub distance: f32,
}

/// Three parallel sequences of equal length: documents, metadatas and
/// distances. Returned by vector-store queries and by the retrieval engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    documents: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
    distances: Vec<f32>,
}

impl RetrievalResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry. Negative distances are clamped to zero.
    pub fn push(&mut self, document: String, metadata: ChunkMetadata, distance: f32) {
        self.documents.push(document);
        self.metadatas.push(metadata);
        self.distances.push(distance.max(0.0));
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn metadatas(&self) -> &[ChunkMetadata] {
        &self.metadatas
    }

    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn into_scored(self) -> Vec<ScoredChunk> {
        self.documents
            .into_iter()
            .zip(self.metadatas)
            .zip(self.distances)
            .map(|((text, metadata), distance)| ScoredChunk {
                text,
                metadata,
                distance,
            })
            .collect()
    }
}

impl FromIterator<ScoredChunk> for RetrievalResult {
    fn from_iter<I: IntoIterator<Item = ScoredChunk>>(iter: I) -> Self {
        let mut result = RetrievalResult::new();
        for c in iter {
            result.push(c.text, c.metadata, c.distance);
        }
        result
    }
}
