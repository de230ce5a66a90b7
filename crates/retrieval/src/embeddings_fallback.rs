//! Remote-first embedder that degrades to the hashed local embedder on any
//! remote failure. The degradation is silent toward callers; it only shows up
//! in the logs.

use {async_trait::async_trait, tracing::warn};

use crate::{
    embeddings::EmbeddingProvider, embeddings_hash::HashEmbedder, embeddings_openai::OpenAiEmbedder,
};

pub struct ResilientEmbedder {
    remote: Option<OpenAiEmbedder>,
    local: HashEmbedder,
}

impl ResilientEmbedder {
    /// `dims` applies to the local fallback. Remote and local dimensions
    /// should match, otherwise chunks written by one cannot be ranked against
    /// queries embedded by the other.
    #[must_use]
    pub fn new(remote: Option<OpenAiEmbedder>, dims: usize) -> Self {
        Self {
            remote,
            local: HashEmbedder::new(dims),
        }
    }

    #[must_use]
    pub fn local_only(dims: usize) -> Self {
        Self::new(None, dims)
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }
}

#[async_trait]
impl EmbeddingProvider for ResilientEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if let Some(remote) = &self.remote {
            match remote.embed(text).await {
                Ok(v) if !v.is_empty() => return Ok(v),
                Ok(_) => warn!("remote embedding was empty, using local fallback"),
                Err(e) => warn!(error = %e, "remote embedding failed, using local fallback"),
            }
        }
        Ok(self.local.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if let Some(remote) = &self.remote {
            match remote.embed_batch(texts).await {
                Ok(vs) => return Ok(vs),
                Err(e) => warn!(error = %e, "remote batch embedding failed, using local fallback"),
            }
        }
        Ok(texts.iter().map(|t| self.local.embed_text(t)).collect())
    }

    fn model_name(&self) -> &str {
        match &self.remote {
            Some(remote) => remote.model_name(),
            None => self.local.model_name(),
        }
    }

    fn dimensions(&self) -> usize {
        self.local.dimensions()
    }
}
