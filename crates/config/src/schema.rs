//! Config schema. Every section has serde defaults so a partial file (or no
//! file at all) still yields a usable configuration; secrets normally arrive
//! through `${ENV_VAR}` placeholders expanded at load time.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhonotekConfig {
    pub server: ServerConfig,
    pub platform: PlatformConfig,
    pub embeddings: EmbeddingsConfig,
    pub stt: SttConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

/// The managed backend platform (rows + object storage).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Base URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Service-role key; use `${PHONOTEK_SERVICE_KEY}` in the file.
    pub service_key: String,
    /// Name of the server-side nearest-neighbor RPC. Unset means the
    /// platform has none and ranking happens in-process.
    pub vector_rpc: Option<String>,
    /// Bucket for uploaded recordings.
    pub audio_bucket: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            vector_rpc: Some("match_chunks".into()),
            audio_bucket: "audio".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    /// Remote embedding API key; absent means hashed local embeddings only.
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "text-embedding-3-small".into(),
            dimensions: 1536,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// "whisper" (remote) or "local" (whisper.cpp binary).
    pub provider: String,
    pub api_key: Option<String>,
    /// GGUF model path for the local provider.
    pub local_model_path: Option<std::path::PathBuf>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            provider: "whisper".into(),
            api_key: None,
            local_model_path: None,
        }
    }
}
