//! Embedding infrastructure for persona recommendations.
//!
//! # Architecture
//!
//! - `embeddings`: `Embedder` trait and the fastembed-backed model
//! - `hashing`: download-free feature-hashing embedder
//! - `similarity`: cosine similarity
//! - `preprocess`: text preparation and content hashing
//! - `cache`: per-user aggregate vector memo

mod cache;
pub mod embeddings;
mod hashing;
mod preprocess;
mod similarity;

pub use cache::{ProfileCache, DEFAULT_CACHE_CAPACITY};
pub use embeddings::{Embedder, EmbeddingError, EmbeddingModel};
pub use hashing::{HashingEmbedder, DEFAULT_HASHING_DIMENSIONS};
pub use preprocess::{content_hash, join_messages, persona_profile_text};
pub use similarity::{cosine_similarity, l2_norm};

/// Default embedding model name
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
