//! Scraped-text normalization.
//!
//! `clean` strips navigation chrome, repairs known per-department scraping
//! defects and rewrites office listings into the canonical
//! `- {room} {nameZh} ({nameEn})` form under `## {floor}` headers.
//!
//! It is idempotent: the supplementary location block appended during
//! enrichment is cut before anything else, and every rewritten line is one
//! the next pass leaves alone.

use crate::extract::locations::FLOOR_GLYPH;

/// Start of the block appended by location enrichment.
pub const SUPPLEMENT_MARKER: &str = "【系統補充位置資訊】";

/// Lines containing any of these are page chrome, not content.
pub const NOISE_PHRASES: &[&str] = &[
    "Administration Building - List of Offices",
    "Main Content",
    "地圖 MAP",
    "校園景觀 Campus View",
    "更多資訊",
    "學校地圖上的建物編號",
    "Building ID /",
    "單位清單 / Offices list",
];

/// Literal repairs for one department's scraped pages.
#[derive(Debug, Clone, Copy)]
pub struct DepartmentFix {
    pub department: &'static str,
    /// Substring replacements applied per line.
    pub replacements: &'static [(&'static str, &'static str)],
    /// A consecutive line pair that starts a repeated footer. The pair and
    /// everything after it are dropped.
    pub footer: Option<(&'static str, &'static str)>,
}

pub const DEPARTMENT_FIXES: &[DepartmentFix] = &[DepartmentFix {
    department: "admin",
    replacements: &[("Admi nistration", "Administration")],
    footer: Some((
        "Overseas Chinese and Mainland Chinese Students Advising Division",
        "列印成績單",
    )),
}];

/// Normalize raw scraped `text` from `department`.
pub fn clean(text: &str, department: &str) -> String {
    let text = strip_supplement(text);
    if text.is_empty() {
        return String::new();
    }

    let fix = DEPARTMENT_FIXES.iter().find(|f| f.department == department);
    let mut lines: Vec<String> = text.split('\n').filter_map(|l| clean_line(l, fix)).collect();

    if let Some((first, second)) = fix.and_then(|f| f.footer) {
        if let Some(pos) = lines.windows(2).position(|w| w[0] == first && w[1] == second) {
            lines.truncate(pos);
        }
    }

    let result = reformat_listing(&lines).join("\n");
    strip_supplement(&result).to_string()
}

/// Cut everything from the supplementary marker on.
pub fn strip_supplement(text: &str) -> &str {
    match text.find(SUPPLEMENT_MARKER) {
        Some(pos) => text[..pos].trim(),
        None => text.trim(),
    }
}

fn clean_line(raw: &str, fix: Option<&DepartmentFix>) -> Option<String> {
    let mut line = raw.trim().to_string();
    if let Some(fix) = fix {
        for (from, to) in fix.replacements {
            if line.contains(from) {
                line = line.replace(from, to);
            }
        }
    }
    if NOISE_PHRASES.iter().any(|p| line.contains(p)) {
        return None;
    }
    // Header markers are re-added by the structural pass.
    let line = line
        .trim_start_matches(|c: char| c == '#' || c.is_whitespace())
        .trim_end();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

fn reformat_listing(lines: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];

        if is_room_number(line) && i + 2 < lines.len() {
            let name_zh = &lines[i + 1];
            let name_en = &lines[i + 2];
            if is_office_name(name_zh) && !is_structural(name_en) {
                out.push(format!("- {} {} ({})", line, name_zh, name_en));
                i += 3;
                continue;
            }
        }

        if line.contains(FLOOR_GLYPH) && line.chars().count() < 10 {
            out.push(format!("## {}", line));
        } else {
            out.push(line.clone());
        }
        i += 1;
    }
    out
}

/// `106`, `1203`, `B1`, `B105`.
///
/// Also fires on any short number that happens to sit on its own line.
fn is_room_number(line: &str) -> bool {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    (line.len() <= 4 && all_digits(line)) || line.strip_prefix('B').is_some_and(all_digits)
}

fn is_structural(line: &str) -> bool {
    line.contains('#') || line.contains(FLOOR_GLYPH)
}

fn is_office_name(line: &str) -> bool {
    match line.chars().next() {
        Some(c) => !c.is_numeric() && !is_structural(line) && !line.starts_with("- "),
        None => false,
    }
}
