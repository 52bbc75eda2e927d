// Document corpus: chunk storage and the one-time knowledge-base build.
//
// Components:
// - Store: immutable chunks plus the id -> index-slot mapping
// - Loader: knowledge-base TOML file -> chunked, embedded corpus

pub mod loader;
pub mod store;

pub use loader::CorpusLoader;
pub use store::{Chunk, DocumentStore, KnowledgeBase};
