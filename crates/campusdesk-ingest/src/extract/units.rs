//! Organizational-unit names and their join keys.
//!
//! Unit names are found by suffix ("…組", "…處", "…中心", ...). Two rule
//! sets exist: a lenient one used when labelling chunks at build time and
//! a strict one used on retrieved text at query time, where a false
//! positive turns into a useless filtered query.

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A suffix with a length bound on what may precede it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitRule {
    pub suffix: &'static str,
    pub min_prefix: usize,
    pub max_prefix: usize,
}

const fn rule(suffix: &'static str, min_prefix: usize, max_prefix: usize) -> UnitRule {
    UnitRule { suffix, min_prefix, max_prefix }
}

/// Build-time rules, in priority order.
pub const LENIENT_RULES: &[UnitRule] = &[
    rule("組", 2, 12),
    rule("處", 2, 12),
    rule("中心", 2, 12),
    rule("部", 2, 12),
    rule("室", 2, 12),
    rule("館", 2, 12),
    rule("系", 2, 12),
    rule("所", 2, 12),
    rule("院", 2, 12),
    rule("課", 2, 12),
];

/// Query-time rules.
pub const STRICT_RULES: &[UnitRule] = &[
    rule("組", 2, 6),
    rule("處", 2, 6),
    rule("中心", 2, 8),
    rule("部", 2, 6),
    rule("室", 2, 6),
    rule("館", 2, 6),
];

/// Self-references and generic rooms that look like unit names.
pub const STOP_WORDS: &[&str] = &[
    "本組", "該組", "各組", "分組", "小組", "本部", "該部", "本處", "該處", "本中心", "辦公室", "會議室",
];

/// A strict candidate containing one of these spans a clause, not a name.
pub const CLAUSE_CHARS: &[char] = &['由', '為', '至', '在', '向', '到'];

/// Characters a strict candidate may not contain.
const STRICT_EXCLUDED: &str = r"\s,，。、：:（）()【】「」";

/// Removed by [`normalize`] in addition to whitespace.
const KEY_PUNCTUATION: &[char] = &[
    '(', ')', '（', '）', '[', ']', '【', '】', '「', '」', '『', '』', '-', '–', '—', '_', '·',
    '•', ':', '：', ',', '，', '、', '。', '．', '.', '/', '\\', ';', '；', '!', '！', '?', '？',
    '\'', '"', '“', '”',
];

static LENIENT: Lazy<Vec<Regex>> = Lazy::new(|| {
    LENIENT_RULES
        .iter()
        .map(|r| {
            let pattern = format!("(.{{{},{}}}{})", r.min_prefix, r.max_prefix, regex::escape(r.suffix));
            Regex::new(&pattern).expect("valid lenient unit pattern")
        })
        .collect()
});

static STRICT: Lazy<Vec<Regex>> = Lazy::new(|| {
    STRICT_RULES
        .iter()
        .map(|r| {
            let pattern = format!(
                "([^{}]{{{},{}}}{})",
                STRICT_EXCLUDED,
                r.min_prefix,
                r.max_prefix,
                regex::escape(r.suffix)
            );
            Regex::new(&pattern).expect("valid strict unit pattern")
        })
        .collect()
});

/// Normalized unit name used to join chunks across documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitKey(String);

impl UnitKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip whitespace and punctuation (ASCII and full-width), then lowercase.
pub fn normalize(unit_name: &str) -> UnitKey {
    let stripped: String = unit_name
        .chars()
        .filter(|c| !c.is_whitespace() && !KEY_PUNCTUATION.contains(c))
        .collect();
    UnitKey(stripped.to_lowercase())
}

/// Lenient single-name detection. The first rule with an acceptable
/// match wins; a match starting with a digit (after any list or header
/// marker) moves on to the next rule.
pub fn detect_unit_name(text: &str) -> Option<String> {
    LENIENT.iter().find_map(|re| {
        let unit = re
            .captures(text)?
            .get(1)?
            .as_str()
            .trim_start_matches(|c: char| c == '-' || c == '#' || c.is_whitespace())
            .trim_end();
        match unit.chars().next() {
            Some(c) if !c.is_numeric() => Some(unit.to_string()),
            _ => None,
        }
    })
}

/// Strict extraction of every plausible unit name in `text`.
pub fn extract_unit_names(text: &str) -> BTreeSet<String> {
    STRICT
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|unit| is_acceptable(unit))
        .collect()
}

fn is_acceptable(unit: &str) -> bool {
    let Some(first) = unit.chars().next() else { return false };
    !first.is_numeric() && !STOP_WORDS.contains(&unit) && !unit.contains(CLAUSE_CHARS)
}
