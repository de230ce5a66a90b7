//! Local transcription through a whisper.cpp CLI binary.
//!
//! The provider is constructed once at startup with an explicit model path
//! and passed by reference to handlers; there is no lazily-initialized
//! process-wide handle. Each call writes the audio to a temp file, runs the
//! binary with JSON output, and parses the result.

use {
    anyhow::{Context, Result, anyhow},
    async_trait::async_trait,
    serde::Deserialize,
    std::path::PathBuf,
    tracing::debug,
};

use super::{Segment, SttProvider, TranscribeRequest, Transcript};

/// Binary names probed on PATH, in order.
const BINARY_NAMES: &[&str] = &["whisper-cli", "whisper-cpp", "main"];

pub struct LocalWhisperStt {
    binary: Option<PathBuf>,
    model_path: PathBuf,
}

impl std::fmt::Debug for LocalWhisperStt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWhisperStt")
            .field("binary", &self.binary)
            .field("model_path", &self.model_path)
            .finish()
    }
}

impl LocalWhisperStt {
    /// Probe PATH for a whisper.cpp binary. The provider is still constructed
    /// when none is found; `is_configured` reports the miss.
    #[must_use]
    pub fn new(model_path: PathBuf) -> Self {
        let binary = BINARY_NAMES.iter().find_map(|name| which::which(name).ok());
        Self { binary, model_path }
    }

    #[must_use]
    pub fn with_binary(model_path: PathBuf, binary: PathBuf) -> Self {
        Self {
            binary: Some(binary),
            model_path,
        }
    }
}

#[async_trait]
impl SttProvider for LocalWhisperStt {
    fn id(&self) -> &'static str {
        "local-whisper"
    }

    fn name(&self) -> &'static str {
        "whisper.cpp"
    }

    fn is_configured(&self) -> bool {
        self.binary.is_some() && self.model_path.exists()
    }

    async fn transcribe(&self, request: TranscribeRequest) -> Result<Transcript> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| anyhow!("no whisper.cpp binary on PATH"))?;
        if !self.model_path.exists() {
            return Err(anyhow!(
                "model file not found: {}",
                self.model_path.display()
            ));
        }

        let dir = tempfile::tempdir().context("create temp dir")?;
        let audio_path = dir
            .path()
            .join(format!("audio.{}", request.format.extension()));
        tokio::fs::write(&audio_path, &request.audio)
            .await
            .context("write audio to temp file")?;
        let out_prefix = dir.path().join("transcript");

        let mut cmd = tokio::process::Command::new(binary);
        cmd.arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg(&audio_path)
            .arg("-oj")
            .arg("-of")
            .arg(&out_prefix);
        if let Some(language) = &request.language {
            cmd.arg("-l").arg(language);
        }

        debug!(binary = %binary.display(), "running local transcription");
        let output = cmd.output().await.context("run whisper.cpp")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("whisper.cpp exited with {}: {stderr}", output.status));
        }

        let json_path = out_prefix.with_extension("json");
        let raw = tokio::fs::read_to_string(&json_path)
            .await
            .context("read whisper.cpp output")?;
        let parsed: CppOutput = serde_json::from_str(&raw).context("parse whisper.cpp output")?;
        Ok(parsed.into_transcript())
    }
}

// ── whisper.cpp JSON output ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CppOutput {
    #[serde(default)]
    transcription: Vec<CppSegment>,
    #[serde(default)]
    result: Option<CppResult>,
}

#[derive(Debug, Deserialize)]
struct CppResult {
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CppSegment {
    offsets: CppOffsets,
    text: String,
}

#[derive(Debug, Deserialize)]
struct CppOffsets {
    from: i64,
    to: i64,
}

impl CppOutput {
    fn into_transcript(self) -> Transcript {
        let segments: Vec<Segment> = self
            .transcription
            .into_iter()
            .map(|s| Segment {
                start_sec: s.offsets.from as f64 / 1000.0,
                end_sec: s.offsets.to as f64 / 1000.0,
                text: s.text.trim().to_string(),
                confidence: None,
            })
            .collect();
        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let duration_secs = segments.last().map(|s| s.end_sec);
        Transcript {
            text,
            language: self.result.and_then(|r| r.language),
            duration_secs,
            segments,
        }
    }
}
