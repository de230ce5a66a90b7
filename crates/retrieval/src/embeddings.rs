//! Seam between the retrieval path and whatever produces vectors: a remote
//! model service, the deterministic hashed fallback, or a test double.

use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a fixed-length vector.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Embed a batch of texts. Defaults to sequential `embed` calls; remote
    /// providers override this with a single request.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Model identifier, recorded alongside chunks for debugging.
    fn model_name(&self) -> &str;

    /// Length of vectors this provider produces.
    fn dimensions(&self) -> usize;
}
