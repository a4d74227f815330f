//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] capability that maps a text to a fixed-length
//! vector, plus [`HashEmbedder`], a deterministic SHA-256-derived
//! placeholder used when no semantic model is configured.
//!
//! Any implementation must:
//! - return exactly [`Embedder::dims`] values,
//! - return a unit-length vector, or the zero vector unchanged,
//! - be deterministic and independent of previously embedded texts, so
//!   chunks can be embedded one at a time without re-indexing.
//!
//! Remote backends (e.g. Ollama) live in the `paper-rag` app crate.

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Maps a text segment to a fixed-dimension vector.
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"sha256-hash"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Hash-derived pseudo-embedding.
///
/// Each block of eight components comes from `SHA-256(block_le || text)`,
/// with every 4-byte word mapped into `[-1.0, 1.0]` before the whole vector
/// is L2-normalized. Carries no semantic signal: identical texts land on
/// the same point, everything else is scattered.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

/// Default dimension, matching common small sentence-embedding models.
pub const DEFAULT_DIMS: usize = 384;

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMS)
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "sha256-hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = Vec::with_capacity(self.dims);
        let mut block: u32 = 0;

        while vector.len() < self.dims {
            let mut hasher = Sha256::new();
            hasher.update(block.to_le_bytes());
            hasher.update(text.as_bytes());
            let digest = hasher.finalize();

            for word in digest.chunks_exact(4) {
                if vector.len() == self.dims {
                    break;
                }
                let bits = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                let unit = bits as f64 / u32::MAX as f64;
                vector.push((unit * 2.0 - 1.0) as f32);
            }
            block += 1;
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }
}

/// Scale `vector` to unit length in place. The zero vector is left as is.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = l2_norm(vector);
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Euclidean length of a vector.
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Squared Euclidean distance. Callers guarantee equal lengths.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Encode a float vector as little-endian f32 bytes.
///
/// # Example
///
/// ```rust
/// use paper_rag_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), Some(v));
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes. Returns `None` when the length is not a
/// multiple of four.
pub fn blob_to_vec(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}
