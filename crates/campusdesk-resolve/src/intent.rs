//! Query intent classification.

use serde::{Deserialize, Serialize};

use campusdesk_ingest::extract::{contains_any, PHONE_KEYWORDS, SERVICE_KEYWORDS};
use campusdesk_store::ChunkType;

pub const LOCATION_KEYWORDS: &[&str] = &["在哪", "位置", "地址", "怎麼去", "如何到", "where", "location", "幾樓"];

/// Coarse query category used to bias ranking toward one chunk type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Location,
    Phone,
    Service,
    General,
}

impl Intent {
    /// The chunk type this intent favours, if any.
    pub fn chunk_type(&self) -> Option<ChunkType> {
        match self {
            Self::Location => Some(ChunkType::Location),
            Self::Phone => Some(ChunkType::Phone),
            Self::Service => Some(ChunkType::Service),
            Self::General => None,
        }
    }

    /// Distance subtracted from chunks of the favoured type.
    pub fn discount(&self) -> f32 {
        match self {
            Self::Location => 0.2,
            Self::Phone => 0.15,
            Self::Service => 0.1,
            Self::General => 0.0,
        }
    }

    pub fn favours(&self, chunk_type: ChunkType) -> bool {
        self.chunk_type() == Some(chunk_type)
    }

    /// Distance after the intent discount, floored at zero.
    pub fn adjust(&self, chunk_type: ChunkType, distance: f32) -> f32 {
        if self.favours(chunk_type) {
            (distance - self.discount()).max(0.0)
        } else {
            distance
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Phone => "phone",
            Self::Service => "service",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location beats phone beats service; anything else is general.
pub fn classify_intent(query: &str) -> Intent {
    if contains_any(query, LOCATION_KEYWORDS) {
        Intent::Location
    } else if contains_any(query, PHONE_KEYWORDS) {
        Intent::Phone
    } else if contains_any(query, SERVICE_KEYWORDS) {
        Intent::Service
    } else {
        Intent::General
    }
}
