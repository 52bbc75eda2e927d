//! Deterministic token-hash embedder.
//!
//! Buckets lowercased tokens into a fixed-width count vector via xxHash.
//! No model download, no network, same output for the same text on every
//! run. Used for offline operation, diagnostics, and tests; shared
//! vocabulary between a query and a chunk still yields high cosine
//! similarity, which is all the retrieval path needs.

use crate::embedding::EmbeddingProvider;
use crate::errors::Result;
use async_trait::async_trait;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Token-hash embedding provider
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    dimension: usize,
}

impl HashedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(token.as_bytes());
        (hasher.finish() % self.dimension as u64) as usize
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for raw in text.split_whitespace() {
            let token: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            if token.is_empty() {
                continue;
            }
            vector[self.bucket(&token)] += 1.0;
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.encode(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
