//! Knowledge-base corpus loader.
//!
//! Reads a TOML file of source documents, splits each document into
//! retrievable chunks, embeds them in batch, and performs the one-time
//! knowledge-base build.
//!
//! File format:
//!
//! ```toml
//! [[documents]]
//! id = "funds-basics"
//! text = """..."""
//! ```

use crate::corpus::store::{Chunk, KnowledgeBase};
use crate::embedding::EmbeddingProvider;
use crate::errors::{RagError, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct KnowledgeFile {
    #[serde(default)]
    documents: Vec<DocumentEntry>,
}

#[derive(Debug, Deserialize)]
struct DocumentEntry {
    id: String,
    text: String,
}

/// Builds the knowledge base from a corpus file using the configured
/// embedding provider.
pub struct CorpusLoader {
    embedder: Arc<dyn EmbeddingProvider>,
    max_chunk_chars: usize,
}

impl CorpusLoader {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, max_chunk_chars: usize) -> Self {
        Self {
            embedder,
            max_chunk_chars,
        }
    }

    /// Load a knowledge-base file and build the index.
    ///
    /// A missing or empty file yields an empty knowledge base rather than
    /// an error; queries against it report no grounding context.
    pub async fn load(&self, path: &Path) -> Result<KnowledgeBase> {
        if !path.exists() {
            return KnowledgeBase::build(Vec::new(), self.embedder.dimension());
        }

        let contents = std::fs::read_to_string(path)?;
        let file: KnowledgeFile = toml::from_str(&contents)
            .map_err(|e| RagError::Corpus(format!("failed to parse {}: {}", path.display(), e)))?;

        self.build_from_documents(&file.documents).await
    }

    async fn build_from_documents(&self, documents: &[DocumentEntry]) -> Result<KnowledgeBase> {
        let mut texts = Vec::new();
        let mut sources = Vec::new();

        for doc in documents {
            if doc.id.trim().is_empty() {
                return Err(RagError::Corpus("document id must not be empty".to_string()));
            }
            for piece in split_into_chunks(&doc.text, self.max_chunk_chars) {
                texts.push(piece);
                sources.push(doc.id.clone());
            }
        }

        let borrowed: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&borrowed).await?;

        let dimension = self.embedder.dimension();
        let chunks: Vec<Chunk> = texts
            .into_iter()
            .zip(sources)
            .zip(embeddings)
            .enumerate()
            .map(|(i, ((text, source_document_id), embedding))| Chunk {
                id: i as u64,
                text,
                source_document_id,
                embedding,
            })
            .collect();

        KnowledgeBase::build(chunks, dimension)
    }
}

/// Split a document into chunks of at most `max_chars` characters.
///
/// Paragraphs (blank-line separated) are packed greedily; a single
/// paragraph longer than the budget is hard-split on character
/// boundaries. Counting is in chars, never bytes, so multi-byte text
/// (the corpus is largely Cyrillic) splits safely.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        let paragraph_chars = paragraph.chars().count();

        if paragraph_chars > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            chunks.extend(split_long_paragraph(paragraph, max_chars));
            continue;
        }

        // +2 for the paragraph separator kept inside a chunk
        if !current.is_empty() && current_chars + 2 + paragraph_chars > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
            current_chars += 2;
        }
        current.push_str(paragraph);
        current_chars += paragraph_chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn split_long_paragraph(paragraph: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = paragraph.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect::<String>().trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}
