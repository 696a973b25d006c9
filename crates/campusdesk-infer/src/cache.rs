//! LRU cache for query embeddings.
//!
//! Repeated queries (and the per-unit follow-up queries of two-stage
//! retrieval) hit the same texts often. Default: 1000 entries, 1-hour TTL.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use ndarray::Array1;
use parking_lot::Mutex;

/// Thread-safe LRU cache keyed by query text.
pub struct QueryCache {
    inner: Mutex<Lru>,
    capacity: usize,
    ttl: Duration,
}

struct Lru {
    entries: HashMap<String, (Array1<f32>, Instant)>,
    /// Least recently used at the front.
    recency: VecDeque<String>,
}

impl Lru {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            if let Some(k) = self.recency.remove(pos) {
                self.recency.push_back(k);
            }
        }
    }

    fn forget(&mut self, key: &str) {
        self.entries.remove(key);
        self.recency.retain(|k| k != key);
    }
}

impl QueryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Lru {
                entries: HashMap::with_capacity(capacity),
                recency: VecDeque::with_capacity(capacity),
            }),
            capacity,
            ttl,
        }
    }

    /// Get a cached embedding. Returns None on miss or expired entry.
    pub fn get(&self, query: &str) -> Option<Array1<f32>> {
        let mut lru = self.inner.lock();
        let (vector, expired) = lru
            .entries
            .get(query)
            .map(|(v, inserted_at)| (v.clone(), inserted_at.elapsed() >= self.ttl))?;
        if expired {
            lru.forget(query);
            return None;
        }
        lru.touch(query);
        Some(vector)
    }

    /// Insert an embedding, evicting the least recently used entry when full.
    pub fn put(&self, query: String, embedding: Array1<f32>) {
        if self.capacity == 0 {
            return;
        }
        let mut lru = self.inner.lock();
        if lru.entries.contains_key(&query) {
            lru.touch(&query);
        } else {
            while lru.entries.len() >= self.capacity {
                match lru.recency.pop_front() {
                    Some(oldest) => {
                        lru.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            lru.recency.push_back(query.clone());
        }
        lru.entries.insert(query, (embedding, Instant::now()));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut lru = self.inner.lock();
        lru.entries.clear();
        lru.recency.clear();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }
}
