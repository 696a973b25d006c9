//! Overlapping window splitting.
//!
//! Text is split on the first separator that occurs in it, pieces that are
//! still too long are split again with the remaining separators (falling
//! back to single characters), and the pieces are merged back into windows
//! of at most `chunk_size` characters that share up to `chunk_overlap`
//! characters with their predecessor. Separators stay attached to the end
//! of the piece they terminate, so CJK sentence punctuation is preserved.
//!
//! Sizes are counted in characters, not bytes.

use std::collections::VecDeque;

use campusdesk_core::config::ChunkSettings;

pub struct RecursiveChunker {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize, separators: Vec<String>) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size),
            separators: separators.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }

    pub fn from_settings(settings: &ChunkSettings) -> Self {
        Self::new(settings.chunk_size, settings.chunk_overlap, settings.separators.clone())
    }

    /// Split `text` into trimmed, non-empty windows.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_text(text, &separators)
    }

    fn split_text(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // An empty separator means character-level splitting.
        let (separator, remaining) = match separators.iter().position(|s| text.contains(s)) {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", &separators[separators.len()..]),
        };

        let mut windows = Vec::new();
        let mut fitting: Vec<String> = Vec::new();

        for piece in split_keep_end(text, separator) {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                windows.extend(self.merge(&fitting));
                fitting.clear();
            }
            if separator.is_empty() {
                windows.extend(trimmed(&piece));
            } else {
                windows.extend(self.split_text(&piece, remaining));
            }
        }
        if !fitting.is_empty() {
            windows.extend(self.merge(&fitting));
        }
        windows
    }

    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !current.is_empty() {
                windows.extend(trimmed(&current.iter().copied().collect::<String>()));
                // Keep a tail of the previous window as overlap.
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            current.push_back(piece);
            total += len;
        }
        windows.extend(trimmed(&current.iter().copied().collect::<String>()));
        windows
    }
}

fn split_keep_end(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split_inclusive(separator).map(str::to_string).collect()
    }
}

fn trimmed(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
