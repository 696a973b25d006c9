//! Two-stage, intent-aware retrieval.
//!
//! A question like "where is the Registrar?" is usually answered by two
//! documents: a service page that names the unit and a building directory
//! that says where it is. Stage 1 finds the former, the unit it names is
//! resolved to a join key, and Stage 2 pulls everything indexed under that
//! key. Location chunks for every resolved unit are then pinned into the
//! final list so a location question never loses its answer to reranking.
//!
//! ```text
//! query ─ intent ─┬─ single stage (top 15) ───────────────────┐
//!                 └─ stage 1 (top 5) ─ units ─┬─ none ────────┼─ rerank ─ done
//!                                             └─ stage 2 ─────┘     └─ augment ─ done
//! ```
//!
//! Store failures never abort a request: a failing filtered query is retried
//! once without its filter, and a branch that still fails is empty. The one
//! exception is a dimension mismatch, which means the collection was built
//! with another embedder and every query would be meaningless.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use campusdesk_core::{Error, Result, RetrievalSettings};
use campusdesk_ingest::{extract_unit_names, normalize};
use campusdesk_store::{ChunkType, QueryFilter, RetrievalResult, ScoredChunk, VectorStore};

use crate::intent::{classify_intent, Intent};
use crate::types::{CandidateSet, ResolvedUnits, RetrievalMode, RetrievalOutcome, RetrievalPath};

pub struct RetrievalEngine<'a> {
    store: &'a dyn VectorStore,
    settings: RetrievalSettings,
}

impl<'a> RetrievalEngine<'a> {
    pub fn new(store: &'a dyn VectorStore) -> Self {
        Self::with_settings(store, RetrievalSettings::default())
    }

    pub fn with_settings(store: &'a dyn VectorStore, settings: RetrievalSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Two-stage retrieval.
    pub fn retrieve(&self, query: &str) -> Result<RetrievalOutcome> {
        self.retrieve_with(query, RetrievalMode::TwoStage)
    }

    /// Only [`Error::DimensionMismatch`] is returned; every other store
    /// failure degrades to fewer results.
    pub fn retrieve_with(&self, query: &str, mode: RetrievalMode) -> Result<RetrievalOutcome> {
        let intent = classify_intent(query);
        debug!("Query intent: {} ({:?})", intent, mode);

        match mode {
            RetrievalMode::SingleStage => {
                let candidates = self.search(query, self.settings.single_stage_top_n, None)?;
                Ok(self.finish(self.rerank(candidates, intent), intent, RetrievalPath::SingleStage, None))
            }
            RetrievalMode::TwoStage => self.two_stage(query, intent),
        }
    }

    fn two_stage(&self, query: &str, intent: Intent) -> Result<RetrievalOutcome> {
        let stage1 = self.search(query, self.settings.stage1_top_n, None)?;
        let units = self.resolve_units(&stage1);

        if units.is_empty() {
            debug!("No unit resolved from {} stage-1 results", stage1.len());
            return Ok(self.finish(
                self.rerank(stage1, intent),
                intent,
                RetrievalPath::Stage1Reranked,
                None,
            ));
        }

        if units.ids.is_empty() {
            info!("[Two-Stage] units by name: {:?}", units.names);
        } else {
            info!("[Two-Stage] unit ids: {:?}", units.ids);
        }

        let stage2 = self.stage2(query, &units)?;
        let reranked = self.rerank(stage2, intent);
        let augmented = self.augment_locations(reranked, &units, intent)?;
        Ok(self.finish(augmented, intent, RetrievalPath::TwoStage, Some(units)))
    }

    /// Unit ids from metadata and unit names from both text and metadata.
    /// Corrupted ids are dropped here so they never reach a filter.
    pub fn resolve_units(&self, chunks: &[ScoredChunk]) -> ResolvedUnits {
        let mut units = ResolvedUnits::default();
        for chunk in chunks {
            units.names.extend(extract_unit_names(&chunk.text));

            if let Some(id) = chunk.metadata.unit_id.as_deref() {
                if self.is_valid_unit_id(id) {
                    units.ids.insert(id.to_string());
                } else {
                    debug!("Ignoring malformed unit id ({} chars)", id.chars().count());
                }
            }
            if let Some(name) = chunk.metadata.unit_name.as_deref() {
                if !name.trim().is_empty() {
                    units.names.insert(name.to_string());
                }
            }
        }
        units
    }

    /// Join keys whose location chunks belong in the answer: every valid id
    /// as stored, plus the normalized form of every resolved name.
    pub fn location_keys(&self, units: &ResolvedUnits) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = units.ids.iter().cloned().collect();
        for name in &units.names {
            let key = normalize(name).into_string();
            if self.is_valid_unit_id(&key) {
                keys.insert(key);
            }
        }
        keys
    }

    fn is_valid_unit_id(&self, id: &str) -> bool {
        !id.is_empty()
            && id.chars().count() <= self.settings.max_unit_id_chars
            && !id.contains(['\n', '\r'])
    }

    fn stage2(&self, query: &str, units: &ResolvedUnits) -> Result<Vec<ScoredChunk>> {
        let top_n = self.settings.stage2_top_n;
        let mut merged = CandidateSet::new(self.settings.fingerprint_chars);

        for id in &units.ids {
            let filter = QueryFilter::unit_id(id.as_str());
            merged.extend(self.search(query, top_n, Some(&filter))?);
        }

        if merged.is_empty() && !units.names.is_empty() {
            for name in &units.names {
                merged.extend(self.search(&format!("{} {}", name, query), top_n, None)?);
            }
        }

        debug!("Stage 2 merged {} candidates", merged.len());
        let mut candidates = merged.into_vec();
        candidates.sort_by(by_distance);
        candidates.truncate(top_n);
        Ok(candidates)
    }

    /// Apply the intent discount, re-sort and keep the top k.
    pub fn rerank(&self, candidates: Vec<ScoredChunk>, intent: Intent) -> Vec<ScoredChunk> {
        let mut unique = CandidateSet::new(self.settings.fingerprint_chars);
        unique.extend(candidates.into_iter().map(|c| discounted(c, intent)));

        let mut ranked = unique.into_vec();
        ranked.sort_by(|a, b| ranked_order(a, b, intent));
        ranked.truncate(self.settings.top_k);
        ranked
    }

    /// Pin location chunks of every resolved unit into the final list.
    ///
    /// Up to `locations_per_unit` missing location chunks are fetched per
    /// join key. Pinned chunks always survive; the remaining ranked chunks
    /// fill what is left of `top_k`, so the list only grows past `top_k`
    /// when the pinned chunks alone exceed it.
    fn augment_locations(
        &self,
        ranked: Vec<ScoredChunk>,
        units: &ResolvedUnits,
        intent: Intent,
    ) -> Result<Vec<ScoredChunk>> {
        let per_unit = self.settings.locations_per_unit;
        let keys = self.location_keys(units);
        let is_pinned = |chunk: &ScoredChunk| {
            chunk.metadata.chunk_type == ChunkType::Location
                && chunk.metadata.unit_id.as_ref().is_some_and(|id| keys.contains(id))
        };

        let mut pinned = CandidateSet::new(self.settings.fingerprint_chars);
        let mut others = Vec::new();
        for chunk in ranked {
            if is_pinned(&chunk) {
                pinned.insert(chunk);
            } else {
                others.push(chunk);
            }
        }

        for key in &keys {
            let filter = QueryFilter::unit_id(key.as_str()).and_type(ChunkType::Location);
            let mut added = 0;
            for chunk in self.search(key, per_unit, Some(&filter))? {
                // An unfiltered retry may bring back anything.
                if added >= per_unit || !filter.matches(&chunk.metadata) {
                    continue;
                }
                if pinned.insert(discounted(chunk, intent)) {
                    added += 1;
                }
            }
            if added > 0 {
                debug!("Appended {} location chunks for {}", added, key);
            }
        }

        let mut all = pinned.into_vec();
        others.truncate(self.settings.top_k.saturating_sub(all.len()));
        all.extend(others);
        all.sort_by(|a, b| ranked_order(a, b, intent));
        Ok(all)
    }

    /// Query the store; on failure retry once without the filter, then give up
    /// on this branch. A dimension mismatch is returned instead.
    fn search(&self, text: &str, top_n: usize, filter: Option<&QueryFilter>) -> Result<Vec<ScoredChunk>> {
        match self.store.query(text, top_n, filter) {
            Ok(result) => Ok(result.into_scored()),
            Err(e @ Error::DimensionMismatch { .. }) => Err(e),
            Err(e) if filter.is_some() => {
                warn!("Filtered query failed ({}); retrying without filter", e);
                match self.store.query(text, top_n, None) {
                    Ok(result) => Ok(result.into_scored()),
                    Err(e @ Error::DimensionMismatch { .. }) => Err(e),
                    Err(e) => {
                        warn!("Unfiltered retry failed: {}", e);
                        Ok(Vec::new())
                    }
                }
            }
            Err(e) => {
                warn!("Query failed: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn finish(
        &self,
        chunks: Vec<ScoredChunk>,
        intent: Intent,
        path: RetrievalPath,
        units: Option<ResolvedUnits>,
    ) -> RetrievalOutcome {
        let units = units.unwrap_or_default();
        RetrievalOutcome {
            result: chunks.into_iter().collect::<RetrievalResult>(),
            intent,
            path,
            unit_ids: units.ids.into_iter().collect(),
            unit_names: units.names.into_iter().collect(),
        }
    }
}

fn discounted(mut chunk: ScoredChunk, intent: Intent) -> ScoredChunk {
    chunk.distance = intent.adjust(chunk.metadata.chunk_type, chunk.distance);
    chunk
}

fn by_distance(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal)
}

/// Ascending distance; on ties the intent's chunk type comes first.
fn ranked_order(a: &ScoredChunk, b: &ScoredChunk, intent: Intent) -> Ordering {
    by_distance(a, b).then_with(|| {
        let a_fav = intent.favours(a.metadata.chunk_type);
        let b_fav = intent.favours(b.metadata.chunk_type);
        b_fav.cmp(&a_fav)
    })
}
