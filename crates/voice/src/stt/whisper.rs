//! Remote Whisper transcription via an OpenAI-style
//! `/v1/audio/transcriptions` endpoint, requesting `verbose_json` so segment
//! timestamps come back with the text.

use {
    anyhow::{Context, Result, anyhow},
    async_trait::async_trait,
    reqwest::{
        Client,
        multipart::{Form, Part},
    },
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

use super::{Segment, SttProvider, TranscribeRequest, Transcript};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "whisper-1";

#[derive(Clone)]
pub struct WhisperStt {
    client: Client,
    api_key: Option<Secret<String>>,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for WhisperStt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperStt")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl WhisperStt {
    #[must_use]
    pub fn new(api_key: Option<Secret<String>>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn api_key(&self) -> Result<&Secret<String>> {
        self.api_key
            .as_ref()
            .ok_or_else(|| anyhow!("Whisper API key not configured"))
    }
}

#[async_trait]
impl SttProvider for WhisperStt {
    fn id(&self) -> &'static str {
        "whisper"
    }

    fn name(&self) -> &'static str {
        "OpenAI Whisper"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn transcribe(&self, request: TranscribeRequest) -> Result<Transcript> {
        let api_key = self.api_key()?;

        let file_part = Part::bytes(request.audio.to_vec())
            .file_name(format!("audio.{}", request.format.extension()))
            .mime_str(request.format.mime_type())
            .context("invalid mime type")?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        if let Some(language) = request.language {
            form = form.text("language", language);
        }

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .context("send transcription request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("transcription request failed: {status} - {body}"));
        }

        let verbose: VerboseTranscription = response
            .json()
            .await
            .context("parse transcription response")?;

        Ok(Transcript {
            text: verbose.text,
            language: verbose.language,
            duration_secs: verbose.duration,
            segments: verbose
                .segments
                .unwrap_or_default()
                .into_iter()
                .map(|s| Segment {
                    start_sec: s.start,
                    end_sec: s.end,
                    text: s.text.trim().to_string(),
                    // avg_logprob is a log probability; exp gives a rough
                    // per-segment confidence in (0, 1].
                    confidence: s.avg_logprob.map(f64::exp),
                })
                .collect(),
        })
    }
}

// ── API types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Option<Vec<VerboseSegment>>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    avg_logprob: Option<f64>,
}
