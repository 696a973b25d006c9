//! Embedding function contract.
//!
//! An embedder turns a batch of texts into L2-normalized vectors of a fixed
//! dimension. The dimension is agreed with the vector collection when the
//! collection is created; see `campusdesk_store::SqliteCollection`.

use ndarray::Array1;

use campusdesk_core::Result;

/// Trait for embedding backends.
pub trait EmbedderBackend: Send + Sync {
    /// Stable identifier of the embedding function.
    fn name(&self) -> &str;

    /// Embed a batch of texts. Every returned vector has `dimension()`
    /// components and unit L2 norm (or is all zeros for featureless text).
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let mut vectors = self.embed_batch(&[text])?;
        vectors.pop().ok_or_else(|| {
            campusdesk_core::Error::Inference(format!("{} returned no vector", self.name()))
        })
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left untouched.
pub fn normalize_l2(v: &mut Array1<f32>) {
    let norm = v.dot(v).sqrt();
    if norm > 1e-9 {
        *v /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_normalize_l2() {
        let mut v = array![3.0f32, 4.0];
        normalize_l2(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = Array1::<f32>::zeros(4);
        normalize_l2(&mut v);
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
