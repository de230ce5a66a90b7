//! The upload pipeline: accept a recording, store the object, transcribe,
//! embed the transcript segments, and flip the post to `ready`. A failure
//! after the post exists degrades it to `failed` instead of erroring the
//! request, so the client always gets the post back with its final status.

use std::sync::Arc;

use {
    axum::{
        Json,
        extract::{Multipart, Path, State},
    },
    bytes::Bytes,
    tracing::{info, warn},
    uuid::Uuid,
};

use {
    phonotek_retrieval::vector,
    phonotek_store::{NewAudit, NewChunk, NewFile, Post, PostPatch, PostStatus},
    phonotek_voice::{AudioFormat, TranscribeRequest, Transcript},
};

use crate::{
    error::{ApiError, ApiResult},
    handlers::require_owned_post,
    state::AppState,
};

/// Uploads above this size are rejected before any work happens. The router
/// raises axum's default body limit to match; the per-field check below is
/// what produces the typed validation error.
pub(crate) const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

struct Upload {
    data: Bytes,
    filename: String,
    content_type: Option<String>,
    user_id: Option<i64>,
    language: Option<String>,
}

/// `POST /api/posts/{id}/audio` with a multipart body: an `audio` file part
/// plus `user_id` and optional `language` fields.
pub async fn upload_audio(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<Json<Post>> {
    let upload = read_multipart(multipart).await?;
    let actor = upload
        .user_id
        .ok_or_else(|| ApiError::validation("user_id is required"))?;
    let post = require_owned_post(&state, post_id, actor).await?;

    let format = upload
        .content_type
        .as_deref()
        .and_then(AudioFormat::from_mime)
        .unwrap_or_else(|| {
            AudioFormat::from_name(upload.filename.rsplit('.').next().unwrap_or_default())
        });

    state
        .store
        .update_post(
            post_id,
            &PostPatch {
                status: Some(PostStatus::Processing),
                ..Default::default()
            },
        )
        .await?;

    match run_pipeline(&state, &post, actor, upload, format).await {
        Ok(post) => Ok(Json(post)),
        Err(e) => {
            warn!(post_id, error = %e, "ingest pipeline failed");
            let failed = state
                .store
                .update_post(
                    post_id,
                    &PostPatch {
                        status: Some(PostStatus::Failed),
                        ..Default::default()
                    },
                )
                .await?
                .ok_or_else(|| ApiError::not_found("post not found"))?;
            record_audit(&state, actor, "post.ingest_failed", format!("post {post_id}: {e}"))
                .await;
            Ok(Json(failed))
        }
    }
}

/// Everything that can fail after the post exists. Errors here degrade the
/// post rather than the request.
async fn run_pipeline(
    state: &AppState,
    post: &Post,
    actor: i64,
    upload: Upload,
    format: AudioFormat,
) -> anyhow::Result<Post> {
    let object_path = format!(
        "{}/{}/{}.{}",
        post.user_id,
        post.post_id,
        Uuid::new_v4(),
        format.extension()
    );
    let size = upload.data.len() as i64;
    let stored_path = state
        .objects
        .upload(
            &state.audio_bucket,
            &object_path,
            upload.data.clone(),
            format.mime_type(),
        )
        .await?;

    state
        .store
        .insert_file(&NewFile {
            post_id: post.post_id,
            bucket: state.audio_bucket.clone(),
            path: object_path.clone(),
            content_type: Some(format.mime_type().to_string()),
            size_bytes: Some(size),
        })
        .await?;

    let transcript = state
        .stt
        .transcribe(TranscribeRequest {
            audio: upload.data,
            format,
            language: upload.language,
        })
        .await?;

    index_transcript(state, post.post_id, &transcript).await?;

    let ready = state
        .store
        .update_post(
            post.post_id,
            &PostPatch {
                status: Some(PostStatus::Ready),
                audio_url: Some(stored_path),
                transcribed_text: Some(transcript.text.clone()),
                duration_secs: transcript.duration_secs,
                ..Default::default()
            },
        )
        .await?
        .ok_or_else(|| anyhow::anyhow!("post {} disappeared mid-ingest", post.post_id))?;

    record_audit(
        state,
        actor,
        "post.ingest",
        format!("post {} ({} segments)", post.post_id, transcript.segments.len()),
    )
    .await;
    info!(
        post_id = post.post_id,
        segments = transcript.segments.len(),
        duration = transcript.duration_secs,
        "recording ingested"
    );
    Ok(ready)
}

/// Embed every non-empty segment and insert the chunk rows in one batch.
async fn index_transcript(
    state: &AppState,
    post_id: i64,
    transcript: &Transcript,
) -> anyhow::Result<()> {
    let segments: Vec<_> = transcript
        .segments
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .collect();
    if segments.is_empty() {
        return Ok(());
    }

    let texts: Vec<String> = segments.iter().map(|s| s.text.trim().to_string()).collect();
    let vectors = state.embedder.embed_batch(&texts).await?;

    let chunks: Vec<NewChunk> = segments
        .iter()
        .zip(vectors.iter())
        .map(|(seg, vec)| NewChunk {
            post_id,
            start_sec: seg.start_sec,
            end_sec: seg.end_sec,
            text: seg.text.trim().to_string(),
            confidence: seg.confidence,
            embedding: vector::to_stored(vec),
        })
        .collect();
    state.store.insert_chunks(&chunks).await
}

/// Audit writes are best-effort: a failed audit insert never fails the
/// request that triggered it.
pub(crate) async fn record_audit(state: &AppState, user_id: i64, action: &str, detail: String) {
    let entry = NewAudit {
        audit_id: Uuid::new_v4().to_string(),
        user_id,
        action: action.to_string(),
        detail: Some(detail),
    };
    if let Err(e) = state.store.insert_audit(&entry).await {
        warn!(action, error = %e, "audit write failed");
    }
}

async fn read_multipart(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut data: Option<Bytes> = None;
    let mut filename = String::new();
    let mut content_type: Option<String> = None;
    let mut user_id: Option<i64> = None;
    let mut language: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "audio" => {
                filename = field.file_name().unwrap_or("recording").to_string();
                content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("could not read audio: {e}")))?;
                if bytes.len() > MAX_UPLOAD_BYTES {
                    return Err(ApiError::validation("audio file too large"));
                }
                data = Some(bytes);
            }
            "user_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(format!("bad user_id field: {e}")))?;
                user_id = Some(
                    text.trim()
                        .parse()
                        .map_err(|_| ApiError::validation("user_id must be an integer"))?,
                );
            }
            "language" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(format!("bad language field: {e}")))?;
                let text = text.trim().to_string();
                if !text.is_empty() {
                    language = Some(text);
                }
            }
            other => {
                warn!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    let data = data.ok_or_else(|| ApiError::validation("an 'audio' file part is required"))?;
    if data.is_empty() {
        return Err(ApiError::validation("audio file is empty"));
    }
    Ok(Upload {
        data,
        filename,
        content_type,
        user_id,
        language,
    })
}
