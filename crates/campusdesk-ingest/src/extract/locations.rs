//! Building-directory parsing.
//!
//! Directory pages list offices under floor headers:
//!
//! ```text
//! ## 1樓
//! - 106 註冊組 (Registrar)
//! - 108 課務組 (Curriculum Division)
//! ```
//!
//! `extract_offices` walks the lines once, carrying the most recent floor
//! header, and emits one [`OfficeRecord`] per office entry seen under a
//! floor. Anything it does not recognize is skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use campusdesk_store::Place;

pub const FLOOR_GLYPH: char = '樓';

/// A known campus building and the strings that identify it in page text.
#[derive(Debug, Clone, Copy)]
pub struct Building {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

/// Checked in order; the first building with a matching alias wins.
pub const BUILDINGS: &[Building] = &[
    Building { name: "行政大樓", aliases: &["行政大樓", "Administration Building"] },
    Building { name: "敬賢樓", aliases: &["敬賢樓", "Jing-Xian Hall"] },
    Building { name: "總圖書館", aliases: &["總圖書館", "Main Library"] },
    Building { name: "共同教學館", aliases: &["共同教學館", "General Building"] },
    Building { name: "禮賢樓", aliases: &["禮賢樓", "Lixian Hall"] },
    Building { name: "展書樓", aliases: &["展書樓", "Jan Shu Hall"] },
    Building { name: "望樂樓", aliases: &["望樂樓", "Hall of Joy and Hope"] },
];

static FLOOR_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:#+\s*)?([0-9]+樓|B[0-9]+)").expect("valid floor pattern"));

static OFFICE_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-\s*([0-9]+|B[0-9]+)\s+(.+?)(?:\s*\((.+?)\))?$").expect("valid office pattern")
});

/// One office entry from a building directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficeRecord {
    pub building: String,
    pub floor: String,
    pub room: String,
    pub name_zh: String,
    pub name_en: Option<String>,
}

impl OfficeRecord {
    /// `"行政大樓 1樓 106室"`
    pub fn location(&self) -> String {
        format!("{} {} {}室", self.building, self.floor, self.room)
    }

    pub fn place(&self) -> Place {
        Place {
            building: self.building.clone(),
            floor: self.floor.clone(),
            room: self.room.clone(),
        }
    }
}

/// Which known building `text` describes, if any.
pub fn detect_building(text: &str) -> Option<&'static str> {
    BUILDINGS
        .iter()
        .find(|b| b.aliases.iter().any(|alias| text.contains(alias)))
        .map(|b| b.name)
}

/// Whether `text` carries floor structure worth scanning.
pub fn has_floor_structure(text: &str) -> bool {
    text.contains("## ") || text.contains(FLOOR_GLYPH)
}

/// Scan cleaned text for office entries in `building`.
pub fn extract_offices(cleaned: &str, building: &str) -> Vec<OfficeRecord> {
    let mut offices = Vec::new();
    let mut current_floor: Option<&str> = None;

    for line in cleaned.lines().map(str::trim) {
        if let Some(caps) = FLOOR_HEADER.captures(line) {
            current_floor = caps.get(1).map(|m| m.as_str());
            continue;
        }

        let Some(floor) = current_floor else { continue };
        let Some(caps) = OFFICE_ENTRY.captures(line) else { continue };
        let (Some(room), Some(name)) = (caps.get(1), caps.get(2)) else { continue };

        let name_zh = name.as_str().trim();
        if name_zh.is_empty() {
            continue;
        }
        offices.push(OfficeRecord {
            building: building.to_string(),
            floor: floor.to_string(),
            room: room.as_str().to_string(),
            name_zh: name_zh.to_string(),
            name_en: caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty()),
        });
    }

    offices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_listing() {
        let text = "## 1樓\n- 106 註冊組 (Registrar)\n- 108 課務組\n## B1\n- B102 總務處 (General Affairs)";
        let offices = extract_offices(text, "行政大樓");
        assert_eq!(offices.len(), 3);
        assert_eq!(
            offices[0],
            OfficeRecord {
                building: "行政大樓".into(),
                floor: "1樓".into(),
                room: "106".into(),
                name_zh: "註冊組".into(),
                name_en: Some("Registrar".into()),
            }
        );
        assert_eq!(offices[1].name_zh, "課務組");
        assert_eq!(offices[1].name_en, None);
        assert_eq!(offices[2].floor, "B1");
        assert_eq!(offices[2].room, "B102");
        assert_eq!(offices[0].location(), "行政大樓 1樓 106室");
    }

    #[test]
    fn test_entries_before_any_floor_are_skipped() {
        let text = "- 101 訪客中心 (Visitor Center)\n## 2樓\n- 201 秘書室 (Secretariat)";
        let offices = extract_offices(text, "行政大樓");
        assert_eq!(offices.len(), 1);
        assert_eq!(offices[0].floor, "2樓");
    }

    #[test]
    fn test_floor_persists_across_unmatched_lines() {
        let text = "## 3樓\n說明文字\n- 305 研究發展處\n其他";
        let offices = extract_offices(text, "敬賢樓");
        assert_eq!(offices.len(), 1);
        assert_eq!(offices[0].floor, "3樓");
        assert_eq!(offices[0].building, "敬賢樓");
    }

    #[test]
    fn test_unrecognized_lines_never_fail() {
        assert!(extract_offices("", "行政大樓").is_empty());
        assert!(extract_offices("- \n-\n## \n()", "行政大樓").is_empty());
    }

    #[test]
    fn test_detect_building() {
        assert_eq!(detect_building("Administration Building 1F"), Some("行政大樓"));
        assert_eq!(detect_building("位於總圖書館二樓"), Some("總圖書館"));
        assert_eq!(detect_building("操場"), None);
        assert!(has_floor_structure("## 1樓"));
        assert!(!has_floor_structure("沒有結構"));
    }
}
