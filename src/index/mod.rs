// Vector index over document-chunk embeddings.
//
// A flat dot-product scan over L2-normalized vectors: small fixed corpora
// make exhaustive search both exact and fast enough, and normalizing once
// at build time turns cosine similarity into a plain dot product.

pub mod flat;

pub use flat::{IndexHit, VectorIndex};
