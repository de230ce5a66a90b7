//! The retrieval fallback chain.
//!
//! Preferred path is the platform's server-side nearest-neighbor function,
//! scoped to the requesting user's own posts. When that errors or matches
//! nothing, a case-insensitive substring search takes over (`mode:
//! "text_fallback"`). When the platform has no server-side function at all,
//! candidates are pulled and ranked here by cosine similarity.

use tracing::{debug, warn};

use phonotek_store::{ChunkIndex, RagChunk, pagination};

use crate::{
    embeddings::EmbeddingProvider,
    vector::{self, VectorParseError},
};

/// Hard cap on rows per search, regardless of the requested limit.
pub const MAX_LIMIT: usize = 100;

/// How many candidate chunks to pull for local ranking.
pub const CANDIDATE_POOL: usize = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Vector,
    TextFallback,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub chunk_id: i64,
    pub post_id: i64,
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Cosine similarity when ranked locally; absent on the other paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl SearchHit {
    fn from_chunk(chunk: RagChunk, score: Option<f32>) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            post_id: chunk.post_id,
            start_sec: chunk.start_sec,
            end_sec: chunk.end_sec,
            text: chunk.text,
            confidence: chunk.confidence,
            score,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub page: usize,
    pub limit: usize,
    pub mode: SearchMode,
}

/// Run the full chain for one query. Never errors for an empty archive; only
/// collaborator failures on the fallback path surface as errors.
pub async fn rag_search(
    index: &dyn ChunkIndex,
    embedder: &dyn EmbeddingProvider,
    user_id: i64,
    query: &str,
    page: usize,
    limit: usize,
) -> anyhow::Result<SearchResponse> {
    let limit = pagination::clamp_limit(limit, MAX_LIMIT);
    let page = pagination::clamp_page(page);

    let embedding = embedder.embed(query).await?;

    if index.server_side_ranking() {
        match index.nearest_chunks(user_id, &embedding, limit).await {
            Ok(rows) if !rows.is_empty() => {
                return Ok(SearchResponse {
                    results: rows
                        .into_iter()
                        .map(|c| SearchHit::from_chunk(c, None))
                        .collect(),
                    page,
                    limit,
                    mode: SearchMode::Vector,
                });
            },
            Ok(_) => debug!(user_id, "vector search matched nothing"),
            Err(e) => warn!(user_id, error = %e, "server-side vector search failed"),
        }

        let rows = index
            .text_search_chunks(user_id, query, page, limit)
            .await?;
        return Ok(SearchResponse {
            results: rows
                .into_iter()
                .map(|c| SearchHit::from_chunk(c, None))
                .collect(),
            page,
            limit,
            mode: SearchMode::TextFallback,
        });
    }

    // No server-side ranking: pull candidates and rank here.
    let candidates = index.chunks_for_user(user_id, CANDIDATE_POOL).await?;
    let results = rank_local(&embedding, candidates, limit);
    Ok(SearchResponse {
        results,
        page,
        limit,
        mode: SearchMode::Vector,
    })
}

/// Rank candidates by cosine similarity against the query embedding.
///
/// The query is normalized once; each candidate is scored against its raw
/// stored vector. Candidates with missing, unparsable, or length-mismatched
/// embeddings, or with non-positive norm, are skipped rather than scored as
/// zero. Sort is stable, so ties keep retrieval order (chunk id ascending).
fn rank_local(query: &[f32], candidates: Vec<RagChunk>, limit: usize) -> Vec<SearchHit> {
    let mut normalized = query.to_vec();
    if vector::l2_normalize(&mut normalized) <= 0.0 {
        // Tokenless query: similarity undefined for every candidate.
        return Vec::new();
    }

    let mut scored: Vec<(f32, RagChunk)> = Vec::new();
    for chunk in candidates {
        let Some(raw) = chunk.embedding.as_ref() else {
            continue;
        };
        let parsed = match vector::parse_embedding(raw) {
            Ok(v) => v,
            Err(VectorParseError::Empty) => continue,
            Err(e) => {
                debug!(chunk_id = chunk.chunk_id, error = %e, "skipping chunk");
                continue;
            },
        };
        if parsed.len() != normalized.len() {
            debug!(
                chunk_id = chunk.chunk_id,
                got = parsed.len(),
                want = normalized.len(),
                "dimension mismatch, skipping chunk"
            );
            continue;
        }
        let norm = vector::l2_norm(&parsed);
        if norm <= 0.0 {
            continue;
        }
        let score = vector::dot(&normalized, &parsed) / norm;
        scored.push((score, chunk));
    }

    scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
        .into_iter()
        .map(|(score, chunk)| SearchHit::from_chunk(chunk, Some(score)))
        .collect()
}
