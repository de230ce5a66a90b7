//! Deterministic, dependency-free embedding used when no model service is
//! reachable. Quality is well below a real model, but search stays functional
//! and the output is reproducible, which the tests rely on.

use {
    async_trait::async_trait,
    sha2::{Digest, Sha256},
};

use crate::{embeddings::EmbeddingProvider, vector};

pub const DEFAULT_DIMENSIONS: usize = 384;

/// Hashed n-gram embedder: unigrams weigh 1.0, adjacent bigrams 0.5, output
/// L2-normalized. Tokenless text maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashEmbedder {
    #[must_use]
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    /// Synchronous embedding; the trait impl delegates here.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut v = vec![0.0f32; self.dims];
        if tokens.is_empty() {
            return v;
        }
        for token in &tokens {
            v[self.bucket(token)] += 1.0;
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            v[self.bucket(&bigram)] += 0.5;
        }
        vector::l2_normalize(&mut v);
        v
    }

    /// SHA-256 keeps bucket assignment stable across platforms and runs,
    /// unlike `DefaultHasher`.
    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut eight = [0u8; 8];
        eight.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(eight) % self.dims as u64) as usize
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn model_name(&self) -> &str {
        "hashed-ngram"
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
