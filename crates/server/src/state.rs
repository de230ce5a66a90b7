//! Shared application state. Every collaborator is constructed once at
//! startup and injected here as a trait object; handlers never reach for
//! globals or lazy statics.

use std::sync::Arc;

use {
    phonotek_retrieval::EmbeddingProvider,
    phonotek_store::{ArchiveStore, ChunkIndex, ObjectStore},
    phonotek_voice::SttProvider,
};

pub struct AppState {
    pub store: Arc<dyn ArchiveStore>,
    pub index: Arc<dyn ChunkIndex>,
    pub objects: Arc<dyn ObjectStore>,
    pub stt: Arc<dyn SttProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    /// Bucket uploaded recordings land in.
    pub audio_bucket: String,
    /// Lifetime of issued signed URLs.
    pub signed_url_ttl_secs: u64,
}

impl AppState {
    pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;
}
