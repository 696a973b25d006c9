//! uint8 storage form of embeddings.
//!
//! Each stored vector keeps one byte per component plus a scale and offset:
//! `value ≈ byte * scale + offset`. Cuts the collection size by 4x at a
//! precision loss well below what cosine ranking notices.

use ndarray::Array1;

/// Embedding in its stored, quantized form.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedVector {
    pub bytes: Vec<u8>,
    pub scale: f32,
    pub offset: f32,
}

impl QuantizedVector {
    /// Map `[min, max]` of the vector linearly onto `[0, 255]`.
    pub fn encode(v: &Array1<f32>) -> Self {
        let (lo, hi) = v
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
        if v.is_empty() {
            return Self {
                bytes: Vec::new(),
                scale: 0.0,
                offset: 0.0,
            };
        }

        let range = hi - lo;
        if range < 1e-9 {
            return Self {
                bytes: vec![0; v.len()],
                scale: 0.0,
                offset: lo,
            };
        }

        let scale = range / 255.0;
        let bytes = v
            .iter()
            .map(|&x| ((x - lo) / scale).round().clamp(0.0, 255.0) as u8)
            .collect();
        Self {
            bytes,
            scale,
            offset: lo,
        }
    }

    pub fn decode(&self) -> Array1<f32> {
        self.bytes
            .iter()
            .map(|&b| b as f32 * self.scale + self.offset)
            .collect()
    }

    pub fn dimension(&self) -> usize {
        self.bytes.len()
    }
}
