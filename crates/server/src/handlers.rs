//! Route handlers. Everything here is validation plus pass-through to the
//! store/object-store collaborators; the retrieval chain is the one exception
//! and lives in `phonotek-retrieval`.

use std::sync::Arc;

use {
    axum::{
        Json,
        extract::{Path, Query, State},
    },
    serde::Deserialize,
    serde_json::{Value, json},
};

use phonotek_store::{
    AuditEntry, FileRecord, MetadataEntry, NewMetadata, NewPost, NewRightsGrant, NewUser, Post,
    PostPatch, PostStatus, RightsGrant, User, pagination,
};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Hard cap for list endpoints (search has its own, higher cap).
const LIST_MAX_LIMIT: usize = 50;

// ── Query types ──────────────────────────────────────────────────────────────

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<i64>,
    pub owner: Option<i64>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    pub user_id: Option<i64>,
}

impl ActorQuery {
    fn require(&self) -> ApiResult<i64> {
        self.user_id
            .ok_or_else(|| ApiError::validation("user_id is required"))
    }
}

// ── Health ───────────────────────────────────────────────────────────────────

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "running",
        "service": "phonotek",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Users ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateUser>,
) -> ApiResult<Json<User>> {
    if body.username.trim().is_empty() {
        return Err(ApiError::validation("username is required"));
    }
    if body.email.trim().is_empty() || !body.email.contains('@') {
        return Err(ApiError::validation("a valid email is required"));
    }
    let user = state
        .store
        .create_user(&NewUser {
            username: body.username,
            email: body.email,
            display_name: body.display_name,
        })
        .await?;
    Ok(Json(user))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<User>> {
    state
        .store
        .get_user(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("user not found"))
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UsersQuery>,
) -> ApiResult<Json<Value>> {
    let limit = pagination::clamp_limit(q.limit, LIST_MAX_LIMIT);
    // Exact-match lookups return zero or one row and ignore paging.
    if let Some(username) = q.username.as_deref() {
        let users: Vec<User> = state
            .store
            .find_user_by_username(username)
            .await?
            .into_iter()
            .collect();
        return Ok(Json(json!({ "users": users, "page": 1, "limit": limit })));
    }
    if let Some(email) = q.email.as_deref() {
        let users: Vec<User> = state
            .store
            .find_user_by_email(email)
            .await?
            .into_iter()
            .collect();
        return Ok(Json(json!({ "users": users, "page": 1, "limit": limit })));
    }
    let page = pagination::clamp_page(q.page);
    let users = state.store.list_users(page, limit).await?;
    Ok(Json(json!({ "users": users, "page": page, "limit": limit })))
}

// ── Posts ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreatePost {
    pub user_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub is_private: bool,
}

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreatePost>,
) -> ApiResult<Json<Post>> {
    let user_id = body
        .user_id
        .ok_or_else(|| ApiError::validation("user_id is required"))?;
    if body.title.trim().is_empty() {
        return Err(ApiError::validation("title is required"));
    }
    if state.store.get_user(user_id).await?.is_none() {
        return Err(ApiError::not_found("user not found"));
    }
    // New posts await their recording; the upload pipeline moves them on.
    let post = state
        .store
        .create_post(&NewPost {
            user_id,
            title: body.title,
            is_private: body.is_private,
            status: PostStatus::Processing,
        })
        .await?;
    Ok(Json(post))
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> ApiResult<Json<Post>> {
    let post = state
        .store
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("post not found"))?;
    // Private posts are indistinguishable from missing ones for non-owners.
    if post.is_private && actor.user_id != Some(post.user_id) {
        return Err(ApiError::not_found("post not found"));
    }
    Ok(Json(post))
}

pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let limit = pagination::clamp_limit(q.limit, LIST_MAX_LIMIT);
    let page = pagination::clamp_page(q.page);
    let posts = state
        .store
        .list_posts(q.owner, q.user_id, page, limit)
        .await?;
    Ok(Json(json!({ "posts": posts, "page": page, "limit": limit })))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePost {
    pub user_id: Option<i64>,
    pub title: Option<String>,
    pub is_private: Option<bool>,
}

pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
    Json(body): Json<UpdatePost>,
) -> ApiResult<Json<Post>> {
    let actor = body
        .user_id
        .ok_or_else(|| ApiError::validation("user_id is required"))?;
    let post = require_owned_post(&state, post_id, actor).await?;

    if let Some(title) = &body.title {
        if title.trim().is_empty() {
            return Err(ApiError::validation("title must not be empty"));
        }
    }
    let patch = PostPatch {
        title: body.title,
        is_private: body.is_private,
        ..Default::default()
    };
    if patch.is_empty() {
        return Ok(Json(post));
    }
    state
        .store
        .update_post(post_id, &patch)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("post not found"))
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> ApiResult<Json<Value>> {
    let actor = actor.require()?;
    require_owned_post(&state, post_id, actor).await?;
    state.store.delete_post(post_id).await?;
    crate::ingest::record_audit(&state, actor, "post.delete", format!("post {post_id}")).await;
    Ok(Json(json!({ "deleted": post_id })))
}

/// Fetch a post and check the actor owns it. 404 when missing, 403 when
/// owned by someone else.
pub(crate) async fn require_owned_post(
    state: &AppState,
    post_id: i64,
    actor: i64,
) -> ApiResult<Post> {
    let post = state
        .store
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("post not found"))?;
    if post.user_id != actor {
        return Err(ApiError::forbidden("not the owner of this post"));
    }
    Ok(post)
}

// ── Files ────────────────────────────────────────────────────────────────────

pub async fn list_post_files(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<Vec<FileRecord>>> {
    if state.store.get_post(post_id).await?.is_none() {
        return Err(ApiError::not_found("post not found"));
    }
    Ok(Json(state.store.list_files_for_post(post_id).await?))
}

pub async fn file_url(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let file = state
        .store
        .get_file(file_id)
        .await?
        .ok_or_else(|| ApiError::not_found("file not found"))?;
    let url = state
        .objects
        .signed_url(&file.bucket, &file.path, state.signed_url_ttl_secs)
        .await?;
    Ok(Json(json!({
        "url": url,
        "expires_in": state.signed_url_ttl_secs,
    })))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> ApiResult<Json<Value>> {
    let actor = actor.require()?;
    let file = state
        .store
        .get_file(file_id)
        .await?
        .ok_or_else(|| ApiError::not_found("file not found"))?;
    require_owned_post(&state, file.post_id, actor).await?;
    state.objects.delete(&file.bucket, &file.path).await?;
    state.store.delete_file(file_id).await?;
    Ok(Json(json!({ "deleted": file_id })))
}

// ── Metadata ─────────────────────────────────────────────────────────────────

pub async fn list_metadata(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<Vec<MetadataEntry>>> {
    if state.store.get_post(post_id).await?.is_none() {
        return Err(ApiError::not_found("post not found"));
    }
    Ok(Json(state.store.list_metadata(post_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct PutMetadata {
    pub user_id: Option<i64>,
    pub entries: std::collections::BTreeMap<String, String>,
}

pub async fn put_metadata(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
    Json(body): Json<PutMetadata>,
) -> ApiResult<Json<Vec<MetadataEntry>>> {
    let actor = body
        .user_id
        .ok_or_else(|| ApiError::validation("user_id is required"))?;
    require_owned_post(&state, post_id, actor).await?;
    if body.entries.is_empty() {
        return Err(ApiError::validation("entries must not be empty"));
    }
    let rows: Vec<NewMetadata> = body
        .entries
        .into_iter()
        .map(|(key, value)| NewMetadata {
            post_id,
            key,
            value,
        })
        .collect();
    Ok(Json(state.store.upsert_metadata(&rows).await?))
}

pub async fn delete_metadata(
    State(state): State<Arc<AppState>>,
    Path(metadata_id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> ApiResult<Json<Value>> {
    let entry = state
        .store
        .get_metadata(metadata_id)
        .await?
        .ok_or_else(|| ApiError::not_found("metadata entry not found"))?;
    require_owned_post(&state, entry.post_id, actor.require()?).await?;
    state.store.delete_metadata(metadata_id).await?;
    Ok(Json(json!({ "deleted": metadata_id })))
}

// ── Rights ───────────────────────────────────────────────────────────────────

pub async fn list_rights(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<Vec<RightsGrant>>> {
    if state.store.get_post(post_id).await?.is_none() {
        return Err(ApiError::not_found("post not found"));
    }
    Ok(Json(state.store.list_rights(post_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateRight {
    pub user_id: Option<i64>,
    pub grantee_id: Option<i64>,
    pub access: phonotek_store::AccessLevel,
}

pub async fn create_right(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
    Json(body): Json<CreateRight>,
) -> ApiResult<Json<RightsGrant>> {
    let actor = body
        .user_id
        .ok_or_else(|| ApiError::validation("user_id is required"))?;
    let grantee = body
        .grantee_id
        .ok_or_else(|| ApiError::validation("grantee_id is required"))?;
    require_owned_post(&state, post_id, actor).await?;
    let grant = state
        .store
        .insert_right(&NewRightsGrant {
            post_id,
            user_id: grantee,
            access: body.access,
        })
        .await?;
    Ok(Json(grant))
}

pub async fn delete_right(
    State(state): State<Arc<AppState>>,
    Path(grant_id): Path<i64>,
    Query(actor): Query<ActorQuery>,
) -> ApiResult<Json<Value>> {
    let grant = state
        .store
        .get_right(grant_id)
        .await?
        .ok_or_else(|| ApiError::not_found("rights grant not found"))?;
    require_owned_post(&state, grant.post_id, actor.require()?).await?;
    state.store.delete_right(grant_id).await?;
    Ok(Json(json!({ "deleted": grant_id })))
}

// ── Audit ────────────────────────────────────────────────────────────────────

pub async fn list_audit(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    let user_id = q
        .user_id
        .ok_or_else(|| ApiError::validation("user_id is required"))?;
    let limit = pagination::clamp_limit(q.limit, LIST_MAX_LIMIT);
    let page = pagination::clamp_page(q.page);
    Ok(Json(state.store.list_audit(user_id, page, limit).await?))
}

// ── Retrieval ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub user_id: Option<i64>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn rag_search(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Json<phonotek_retrieval::SearchResponse>> {
    let query = q
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("search query 'q' is required"))?;
    let user_id = q
        .user_id
        .ok_or_else(|| ApiError::validation("user_id is required"))?;

    let response = phonotek_retrieval::rag_search(
        state.index.as_ref(),
        state.embedder.as_ref(),
        user_id,
        query,
        q.page,
        q.limit,
    )
    .await?;
    Ok(Json(response))
}
