//! Chunk storage and the combined knowledge base.

use crate::errors::{RagError, Result};
use crate::index::VectorIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A unit of source-document text small enough to embed and retrieve
/// independently. Immutable once indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: u64,
    pub text: String,
    pub source_document_id: String,
    pub embedding: Vec<f32>,
}

/// Ordered chunk sequence with id lookup.
///
/// Every chunk has exactly one slot; ids are unique. The store never
/// changes after construction.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    chunks: Vec<Chunk>,
    slot_by_id: HashMap<u64, usize>,
}

impl DocumentStore {
    pub fn new(chunks: Vec<Chunk>) -> Result<Self> {
        let mut slot_by_id = HashMap::with_capacity(chunks.len());

        for (slot, chunk) in chunks.iter().enumerate() {
            if slot_by_id.insert(chunk.id, slot).is_some() {
                return Err(RagError::Corpus(format!("duplicate chunk id: {}", chunk.id)));
            }
        }

        Ok(Self { chunks, slot_by_id })
    }

    pub fn get(&self, id: u64) -> Option<&Chunk> {
        self.slot_by_id.get(&id).map(|&slot| &self.chunks[slot])
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Document store and vector index built together from the same chunks.
///
/// Building both in one step keeps them in bijection: every chunk has
/// exactly one index entry and vice versa, with no partial insert.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    store: DocumentStore,
    index: VectorIndex,
}

impl KnowledgeBase {
    /// One-time build; must complete before any query is served.
    pub fn build(chunks: Vec<Chunk>, dimension: usize) -> Result<Self> {
        let entries: Vec<(u64, Vec<f32>)> = chunks
            .iter()
            .map(|c| (c.id, c.embedding.clone()))
            .collect();

        // Index validates every embedding before creating state, so a
        // dimension mismatch aborts the build with the store untouched.
        let index = VectorIndex::build(dimension, &entries)?;
        let store = DocumentStore::new(chunks)?;

        Ok(Self { store, index })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Number of indexed chunks
    pub fn document_count(&self) -> usize {
        self.store.len()
    }

    /// Embedding dimension shared by all chunks and queries
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }
}
