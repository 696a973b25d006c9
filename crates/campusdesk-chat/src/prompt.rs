//! Prompt assembly.
//!
//! The answer prompt carries fixed answering rules, an optional block
//! describing who is asking, a location hint block built from location
//! chunk metadata, and the retrieved sources.

use std::collections::HashSet;

use campusdesk_store::{ChunkType, RetrievalResult};

use crate::types::ChatMessage;

/// Characters of each source shown to the model.
pub const SOURCE_PREVIEW_CHARS: usize = 500;

/// Messages of history quoted when rewriting a follow-up question.
pub const REWRITE_HISTORY: usize = 6;

const ASSISTANT_RULES: &str = "你是一個專業的「校園行政小助手」。請根據以下提供的【參考資料】來回答使用者的問題。

【回答守則】
1. 你的回答必須**嚴格基於**提供的參考資料。如果參考資料沒有提及，請直接說「抱歉，目前的資料庫中沒有相關資訊」。
2. 若參考資料中有辦理地點資訊，請在回答開頭以「辦理地點：」列出（可多筆）。
3. 回答請條理分明，使用點列式整理重點。
4. 語氣請保持親切、專業。
5. 請使用繁體中文回答。";

/// `"- {unit}：{building} {floor} {room}室"` for every location chunk, in
/// result order, without duplicates.
pub fn location_lines(result: &RetrievalResult) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();

    for meta in result.metadatas() {
        if meta.chunk_type != ChunkType::Location {
            continue;
        }
        let (Some(building), Some(floor), Some(room)) =
            (meta.building.as_deref(), meta.floor.as_deref(), meta.room.as_deref())
        else {
            continue;
        };
        let location = format!("{} {} {}室", building, floor, room);

        let unit = meta
            .unit_name
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(meta.title.as_str());
        let line = if unit.is_empty() {
            format!("- {}", location)
        } else {
            format!("- {}：{}", unit, location)
        };
        if seen.insert(line.clone()) {
            lines.push(line);
        }
    }
    lines
}

fn preview(text: &str) -> String {
    if text.chars().count() > SOURCE_PREVIEW_CHARS {
        let head: String = text.chars().take(SOURCE_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Build the answer prompt. An empty result still yields a complete prompt
/// so the model can say it has no information.
pub fn build_prompt(query: &str, result: &RetrievalResult, identity: &str) -> String {
    let mut prompt = String::from(ASSISTANT_RULES);
    prompt.push('\n');

    let identity = identity.trim();
    if !identity.is_empty() {
        prompt.push_str(&format!(
            "\n【使用者身分資訊】\n{}\n請務必根據上述使用者身分，優先提供適用的規定或流程。若不同身分有不同規定，請明確指出。\n",
            identity
        ));
    }

    prompt.push_str("\n【參考資料】\n");
    let locations = location_lines(result);
    if !locations.is_empty() {
        prompt.push_str("【辦理地點（若適用）】\n");
        prompt.push_str(&locations.join("\n"));
        prompt.push_str("\n\n");
    }

    for (i, (doc, meta)) in result.documents().iter().zip(result.metadatas()).enumerate() {
        let title = if meta.title.is_empty() { "無標題" } else { meta.title.as_str() };
        let url = if meta.url.is_empty() { "#" } else { meta.url.as_str() };
        prompt.push_str(&format!(
            "\n--- 資料來源 {}: [{}]({}) ---\n{}\n",
            i + 1,
            title,
            url,
            preview(doc)
        ));
    }

    prompt.push_str(&format!("\n【使用者問題】\n{}\n", query));
    prompt
}

/// Prompt asking the model to turn a follow-up into a standalone query.
pub fn rewrite_prompt(history: &[ChatMessage], query: &str) -> String {
    let start = history.len().saturating_sub(REWRITE_HISTORY);
    let dialogue = history[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "請將使用者的問題改寫為**完整、可獨立檢索**的查詢句。\n\
         要求：\n\
         1. 必須結合最近對話上下文（包含助理回答），補全代詞與單位名稱。\n\
         2. 不要加入對話中不存在的新資訊。\n\
         3. 只輸出改寫後的查詢句，勿加註解。\n\
         \n\
         【最近對話】\n{}\n\
         \n\
         【使用者最新問題】\n{}\n",
        dialogue.trim(),
        query
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use campusdesk_store::{ChunkMetadata, Place};

    fn registrar_location() -> ChunkMetadata {
        ChunkMetadata::location(
            "註冊組位置",
            "https://admin.example.edu/building",
            "admin",
            Place {
                building: "行政大樓".into(),
                floor: "1樓".into(),
                room: "106".into(),
            },
        )
        .with_unit("註冊組", "註冊組")
    }

    fn general(title: &str) -> ChunkMetadata {
        ChunkMetadata::document(title, "https://aca.example.edu/x", "aca", ChunkType::General)
    }

    #[test]
    fn test_location_lines_deduplicated() {
        let mut result = RetrievalResult::new();
        result.push("a".into(), registrar_location(), 0.1);
        result.push("b".into(), general("休學"), 0.2);
        result.push("c".into(), registrar_location(), 0.3);

        assert_eq!(location_lines(&result), vec!["- 註冊組：行政大樓 1樓 106室"]);
    }

    #[test]
    fn test_empty_result_still_prompts() {
        let prompt = build_prompt("休學怎麼辦", &RetrievalResult::new(), "");
        assert!(prompt.contains("【參考資料】"));
        assert!(prompt.ends_with("【使用者問題】\n休學怎麼辦\n"));
        assert!(!prompt.contains("【使用者身分資訊】"));
        assert!(!prompt.contains("【辦理地點（若適用）】"));
    }

    #[test]
    fn test_identity_block_only_when_given() {
        let prompt = build_prompt("q", &RetrievalResult::new(), "- 學院：工學院\n- 學制：碩士");
        assert!(prompt.contains("【使用者身分資訊】\n- 學院：工學院"));
        assert!(!build_prompt("q", &RetrievalResult::new(), "  ").contains("【使用者身分資訊】"));
    }

    #[test]
    fn test_sources_truncated() {
        let mut result = RetrievalResult::new();
        result.push("字".repeat(600), general("長文"), 0.1);
        result.push("短".into(), general(""), 0.2);

        let prompt = build_prompt("q", &result, "");
        assert!(prompt.contains(&format!("{}...", "字".repeat(SOURCE_PREVIEW_CHARS))));
        assert!(!prompt.contains(&"字".repeat(SOURCE_PREVIEW_CHARS + 1)));
        assert!(prompt.contains("--- 資料來源 2: [無標題](https://aca.example.edu/x) ---\n短"));
    }

    #[test]
    fn test_location_hint_precedes_sources() {
        let mut result = RetrievalResult::new();
        result.push("註冊組位於行政大樓".into(), registrar_location(), 0.1);

        let prompt = build_prompt("註冊組在哪", &result, "");
        let hint = prompt.find("【辦理地點（若適用）】").unwrap();
        let source = prompt.find("--- 資料來源 1").unwrap();
        assert!(hint < source);
    }

    #[test]
    fn test_rewrite_uses_recent_history() {
        let history: Vec<ChatMessage> = (0..8)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("問題{}", i))
                } else {
                    ChatMessage::assistant(format!("回答{}", i))
                }
            })
            .collect();

        let prompt = rewrite_prompt(&history, "那在哪裡");
        assert!(!prompt.contains("問題0"));
        assert!(!prompt.contains("回答1"));
        assert!(prompt.contains("使用者: 問題2"));
        assert!(prompt.contains("助理: 回答7"));
        assert!(prompt.contains("【使用者最新問題】\n那在哪裡"));
    }
}
