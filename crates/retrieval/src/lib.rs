//! Retrieval core: query text → embedding → ranked transcript chunks, with a
//! text-match fallback when vector search yields nothing.

pub mod embeddings;
pub mod embeddings_fallback;
pub mod embeddings_hash;
pub mod embeddings_openai;
pub mod search;
pub mod vector;

pub use {
    embeddings::EmbeddingProvider,
    embeddings_fallback::ResilientEmbedder,
    embeddings_hash::HashEmbedder,
    embeddings_openai::OpenAiEmbedder,
    search::{SearchHit, SearchMode, SearchResponse, rag_search},
};
