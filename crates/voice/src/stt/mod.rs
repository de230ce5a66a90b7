//! STT provider trait and transcript types.

pub mod local;
pub mod whisper;

use {async_trait::async_trait, bytes::Bytes, serde::Serialize};

// ── Audio formats ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Ogg,
    M4a,
}

impl AudioFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
            Self::M4a => "audio/mp4",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
            Self::M4a => "m4a",
        }
    }

    /// Map a declared content type; `None` when it isn't a known audio mime.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "audio/mpeg" | "audio/mp3" => Some(Self::Mp3),
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some(Self::Wav),
            "audio/ogg" | "audio/opus" => Some(Self::Ogg),
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => Some(Self::M4a),
            _ => None,
        }
    }

    /// Map a file extension or short format name; unknown inputs fall back to
    /// mp3, mirroring how uploads without a recognizable extension are stored.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "wav" => Self::Wav,
            "ogg" | "opus" => Self::Ogg,
            "m4a" | "mp4" | "aac" => Self::M4a,
            _ => Self::Mp3,
        }
    }
}

// ── Request / result types ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    pub audio: Bytes,
    pub format: AudioFormat,
    /// ISO 639-1 hint; providers auto-detect when absent.
    pub language: Option<String>,
}

/// One time-stamped piece of the transcript.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    /// Full text, as returned by the provider.
    pub text: String,
    pub language: Option<String>,
    pub duration_secs: Option<f64>,
    /// Ordered segments; may be empty if the provider returned none.
    pub segments: Vec<Segment>,
}

// ── Provider trait ───────────────────────────────────────────────────────────

#[async_trait]
pub trait SttProvider: Send + Sync {
    /// Stable provider id (e.g. "whisper").
    fn id(&self) -> &'static str;

    /// Human-readable provider name.
    fn name(&self) -> &'static str;

    /// Whether this provider has everything it needs to run.
    fn is_configured(&self) -> bool;

    async fn transcribe(&self, request: TranscribeRequest) -> anyhow::Result<Transcript>;
}
