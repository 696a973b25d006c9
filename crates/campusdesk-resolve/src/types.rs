//! Retrieval engine types.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use campusdesk_store::{RetrievalResult, ScoredChunk};

use crate::intent::Intent;

/// How a query should be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    #[default]
    TwoStage,
    SingleStage,
}

/// The path a query actually took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalPath {
    /// Single-stage lookup with reranking, as requested.
    SingleStage,
    /// Two-stage requested, but no unit resolved; the stage-1 set was reranked.
    Stage1Reranked,
    /// Stage 1, unit resolution, stage 2, rerank, location augmentation.
    TwoStage,
}

/// Units found in the stage-1 results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedUnits {
    pub ids: BTreeSet<String>,
    pub names: BTreeSet<String>,
}

impl ResolvedUnits {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.names.is_empty()
    }
}

/// Final result of a retrieval plus how it was reached.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutcome {
    pub result: RetrievalResult,
    pub intent: Intent,
    pub path: RetrievalPath,
    pub unit_ids: Vec<String>,
    pub unit_names: Vec<String>,
}

/// Dedup key: url, title and a text prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    url: String,
    title: String,
    prefix: String,
}

impl Fingerprint {
    pub fn of(chunk: &ScoredChunk, prefix_chars: usize) -> Self {
        Self {
            url: chunk.metadata.url.clone(),
            title: chunk.metadata.title.clone(),
            prefix: chunk.text.chars().take(prefix_chars).collect(),
        }
    }
}

/// Ordered candidates with no two sharing a [`Fingerprint`].
#[derive(Debug, Clone)]
pub struct CandidateSet {
    seen: HashSet<Fingerprint>,
    items: Vec<ScoredChunk>,
    prefix_chars: usize,
}

impl CandidateSet {
    pub fn new(prefix_chars: usize) -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
            prefix_chars,
        }
    }

    /// Add `chunk` unless an equivalent one is already present.
    pub fn insert(&mut self, chunk: ScoredChunk) -> bool {
        if self.seen.insert(Fingerprint::of(&chunk, self.prefix_chars)) {
            self.items.push(chunk);
            true
        } else {
            false
        }
    }

    pub fn extend(&mut self, chunks: impl IntoIterator<Item = ScoredChunk>) {
        for chunk in chunks {
            self.insert(chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<ScoredChunk> {
        self.items
    }
}
