//! Keyword-based chunk type labels.
//!
//! The same keyword sets drive query intent in the retrieval engine, so a
//! phone question and a phone chunk agree on what "phone" means.

use campusdesk_store::ChunkType;

pub const PHONE_KEYWORDS: &[&str] = &["電話", "分機", "聯絡方式", "聯絡", "tel", "phone"];

pub const SERVICE_KEYWORDS: &[&str] = &["服務", "業務", "職掌", "辦理", "申請", "流程", "規定", "要件"];

/// Whether the lowercased `text` contains any keyword.
pub fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
}

/// Phone beats service beats general.
pub fn classify_chunk_type(text: &str) -> ChunkType {
    if contains_any(text, PHONE_KEYWORDS) {
        ChunkType::Phone
    } else if contains_any(text, SERVICE_KEYWORDS) {
        ChunkType::Service
    } else {
        ChunkType::General
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        assert_eq!(classify_chunk_type("申請流程請洽分機 1234"), ChunkType::Phone);
        assert_eq!(classify_chunk_type("辦理休學申請"), ChunkType::Service);
        assert_eq!(classify_chunk_type("校園簡介"), ChunkType::General);
        assert_eq!(classify_chunk_type(""), ChunkType::General);
    }

    #[test]
    fn test_ascii_keywords_ignore_case() {
        assert_eq!(classify_chunk_type("TEL: 03-4227151"), ChunkType::Phone);
        assert_eq!(classify_chunk_type("Phone"), ChunkType::Phone);
    }
}
