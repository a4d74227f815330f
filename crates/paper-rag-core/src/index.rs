//! Exact nearest-neighbor index scoped to one document.
//!
//! Brute-force k-NN under squared Euclidean distance. Each index holds one
//! vector per chunk of a single document, so a linear scan is cheap and
//! gives exact rankings.

use serde::Serialize;
use tracing::debug;

use crate::embedding::squared_l2;
use crate::error::{RagError, Result};

/// One search result: the chunk ordinal and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchHit {
    pub ordinal: usize,
    pub distance: f32,
}

/// Flat vector index keyed by chunk ordinal.
///
/// Ordinals are assigned in insertion order: the `n`-th inserted vector
/// must carry ordinal `n`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dims: usize,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            vectors: Vec::new(),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Stored vector for a chunk ordinal.
    pub fn get(&self, ordinal: usize) -> Option<&[f32]> {
        self.vectors.get(ordinal).map(Vec::as_slice)
    }

    /// All stored vectors in ordinal order.
    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.vectors.iter().map(Vec::as_slice)
    }

    /// Append the vector for `ordinal`.
    ///
    /// # Errors
    ///
    /// - [`RagError::DimensionMismatch`] if `vector.len() != dims`.
    /// - [`RagError::Validation`] if `ordinal` is not the next free slot or
    ///   the vector holds NaN/infinite values.
    pub fn insert(&mut self, ordinal: usize, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dims {
            return Err(RagError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        if ordinal != self.vectors.len() {
            return Err(RagError::Validation(format!(
                "out-of-order insert: expected ordinal {}, got {}",
                self.vectors.len(),
                ordinal
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(RagError::Validation(format!(
                "vector for ordinal {} contains non-finite values",
                ordinal
            )));
        }
        self.vectors.push(vector);
        Ok(())
    }

    /// The `min(k, len)` nearest vectors to `query`, nearest first.
    ///
    /// Equal distances are ordered by ascending ordinal. An empty index
    /// yields an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dims {
            return Err(RagError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, v)| SearchHit {
                ordinal,
                distance: squared_l2(query, v),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.ordinal.cmp(&b.ordinal))
        });
        hits.truncate(k);

        debug!(candidates = self.vectors.len(), returned = hits.len(), "index search");
        Ok(hits)
    }
}
