// Embedding providers: text -> fixed-length vector.
//
// The provider is a capability trait so retrieval and orchestration never
// care whether vectors come from a local transformer encoder or the
// deterministic offline hasher.

pub mod hashed;
pub mod local;

pub use hashed::HashedEmbedder;
pub use local::LocalEmbedder;

use crate::errors::Result;
use async_trait::async_trait;

/// Maps text to a fixed-length numeric vector.
///
/// Implementations are stateless per call and safe to share across
/// concurrent request tasks. Every returned vector has exactly
/// `dimension()` elements.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts; the default embeds sequentially
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Output vector length, fixed for the provider's lifetime
    fn dimension(&self) -> usize;
}
