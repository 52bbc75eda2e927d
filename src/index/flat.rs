//! Flat dot-product index over normalized embeddings.

use crate::errors::{RagError, Result};
use std::cmp::Ordering;

/// Nearest-neighbor hit returned by [`VectorIndex::query`]
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    /// Chunk id of the matched entry
    pub id: u64,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Read-only nearest-neighbor index.
///
/// Built once at startup; `query` takes `&self` and is safe to call from
/// any number of concurrent request tasks.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    /// Row-major normalized vectors, one row per entry
    vectors: Vec<f32>,
    /// Chunk id per row
    ids: Vec<u64>,
}

impl VectorIndex {
    /// Build the index from `(chunk id, embedding)` pairs.
    ///
    /// Every embedding is validated against `dimension` before any state
    /// is created, so a failed build leaves nothing half-inserted.
    pub fn build(dimension: usize, entries: &[(u64, Vec<f32>)]) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Config(
                "embedding dimension must be positive".to_string(),
            ));
        }

        for (_, embedding) in entries {
            if embedding.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
        }

        let mut vectors = Vec::with_capacity(entries.len() * dimension);
        let mut ids = Vec::with_capacity(entries.len());

        for (id, embedding) in entries {
            let mut row = embedding.clone();
            normalize(&mut row);
            vectors.extend_from_slice(&row);
            ids.push(*id);
        }

        Ok(Self {
            dimension,
            vectors,
            ids,
        })
    }

    /// Return up to `k` nearest neighbors by cosine similarity.
    ///
    /// Results are ordered by descending score, ties broken by ascending
    /// chunk id. Fewer than `k` hits are returned only when the index
    /// holds fewer than `k` entries.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut probe = vector.to_vec();
        normalize(&mut probe);

        let mut hits: Vec<IndexHit> = self
            .ids
            .iter()
            .enumerate()
            .map(|(row, &id)| {
                let start = row * self.dimension;
                let score = dot(&probe, &self.vectors[start..start + self.dimension]);
                IndexHit { id, score }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// Number of indexed entries
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when the index holds no entries
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Configured embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// L2-normalize in place; the zero vector is left unchanged
fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
