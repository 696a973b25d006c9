//! Deterministic feature-hashing embedder.
//!
//! Character unigrams and bigrams are hashed into a fixed number of buckets
//! with a signed count, then L2-normalized. Works on CJK text without a
//! tokenizer, needs no model files and gives identical vectors across runs,
//! which makes it the embedder for offline indexing and tests.

use ndarray::Array1;
use sha2::{Digest, Sha256};

use crate::embedder::{normalize_l2, EmbedderBackend};
use campusdesk_core::{Error, Result};

pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn vectorize(&self, text: &str) -> Array1<f32> {
        let mut v = Array1::<f32>::zeros(self.dim);
        let chars: Vec<char> = text
            .chars()
            .flat_map(char::to_lowercase)
            .filter(|c| c.is_alphanumeric())
            .collect();

        for (i, c) in chars.iter().enumerate() {
            let mut buf = [0u8; 4];
            self.add_feature(&mut v, c.encode_utf8(&mut buf).as_bytes(), 1.0);
            if let Some(next) = chars.get(i + 1) {
                let gram: String = [*c, *next].iter().collect();
                // Bigrams carry more of the meaning in CJK text.
                self.add_feature(&mut v, gram.as_bytes(), 1.5);
            }
        }

        normalize_l2(&mut v);
        v
    }

    fn add_feature(&self, v: &mut Array1<f32>, feature: &[u8], weight: f32) {
        let digest = Sha256::digest(feature);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let h = u64::from_le_bytes(head);
        let bucket = (h % self.dim as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

impl EmbedderBackend for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing-char-bigram"
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        if self.dim == 0 {
            return Err(Error::Config("embedding dimension must be positive".into()));
        }
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
