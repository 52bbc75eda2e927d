pub mod engine;

pub use engine::{RetrievalResult, Retriever, SearchParams};
