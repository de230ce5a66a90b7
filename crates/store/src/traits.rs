//! Storage abstractions. `ArchiveStore` covers the relational rows,
//! `ChunkIndex` the retrieval-facing chunk queries, `ObjectStore` the blob
//! side. Split so the search path can be tested against a small mock.

use {async_trait::async_trait, bytes::Bytes};

use crate::rows::{
    AuditEntry, FileRecord, MetadataEntry, NewAudit, NewChunk, NewFile, NewMetadata, NewPost,
    NewRightsGrant, NewUser, Post, PostPatch, RagChunk, RightsGrant, User,
};

// ── Relational rows ──────────────────────────────────────────────────────────

#[async_trait]
pub trait ArchiveStore: Send + Sync {
    // users
    async fn create_user(&self, user: &NewUser) -> anyhow::Result<User>;
    async fn get_user(&self, user_id: i64) -> anyhow::Result<Option<User>>;
    /// Exact-match lookup; usernames are unique in the platform schema.
    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn list_users(&self, page: usize, limit: usize) -> anyhow::Result<Vec<User>>;

    // posts
    async fn create_post(&self, post: &NewPost) -> anyhow::Result<Post>;
    async fn get_post(&self, post_id: i64) -> anyhow::Result<Option<Post>>;
    /// List posts visible to `viewer`: public posts, plus the viewer's own.
    /// `owner` narrows to a single author's posts.
    async fn list_posts(
        &self,
        owner: Option<i64>,
        viewer: Option<i64>,
        page: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Post>>;
    async fn update_post(&self, post_id: i64, patch: &PostPatch) -> anyhow::Result<Option<Post>>;
    async fn delete_post(&self, post_id: i64) -> anyhow::Result<()>;

    // files
    async fn insert_file(&self, file: &NewFile) -> anyhow::Result<FileRecord>;
    async fn get_file(&self, file_id: i64) -> anyhow::Result<Option<FileRecord>>;
    async fn list_files_for_post(&self, post_id: i64) -> anyhow::Result<Vec<FileRecord>>;
    async fn delete_file(&self, file_id: i64) -> anyhow::Result<()>;

    // metadata
    async fn upsert_metadata(&self, entries: &[NewMetadata]) -> anyhow::Result<Vec<MetadataEntry>>;
    async fn get_metadata(&self, metadata_id: i64) -> anyhow::Result<Option<MetadataEntry>>;
    async fn list_metadata(&self, post_id: i64) -> anyhow::Result<Vec<MetadataEntry>>;
    async fn delete_metadata(&self, metadata_id: i64) -> anyhow::Result<()>;

    // rights
    async fn insert_right(&self, grant: &NewRightsGrant) -> anyhow::Result<RightsGrant>;
    async fn get_right(&self, grant_id: i64) -> anyhow::Result<Option<RightsGrant>>;
    async fn list_rights(&self, post_id: i64) -> anyhow::Result<Vec<RightsGrant>>;
    async fn delete_right(&self, grant_id: i64) -> anyhow::Result<()>;

    // audit
    async fn insert_audit(&self, entry: &NewAudit) -> anyhow::Result<()>;
    async fn list_audit(
        &self,
        user_id: i64,
        page: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<AuditEntry>>;

    // chunks (write side; the read side lives on `ChunkIndex`)
    async fn insert_chunks(&self, chunks: &[NewChunk]) -> anyhow::Result<()>;
}

// ── Retrieval-facing chunk queries ───────────────────────────────────────────

#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Whether the platform exposes a server-side nearest-neighbor function.
    /// When false, callers rank candidates locally.
    fn server_side_ranking(&self) -> bool;

    /// Server-side nearest neighbors among chunks of the user's own posts,
    /// ranked, at most `limit` rows.
    async fn nearest_chunks(
        &self,
        user_id: i64,
        query: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<RagChunk>>;

    /// Case-insensitive substring match over chunk text, scoped to the user,
    /// paginated.
    async fn text_search_chunks(
        &self,
        user_id: i64,
        query: &str,
        page: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<RagChunk>>;

    /// Up to `max` candidate chunks for local ranking, chunk id ascending.
    async fn chunks_for_user(&self, user_id: i64, max: usize) -> anyhow::Result<Vec<RagChunk>>;
}

// ── Object storage ───────────────────────────────────────────────────────────

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload an object; returns the platform path of the stored object.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> anyhow::Result<String>;

    /// Issue a time-limited signed URL for an object.
    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_secs: u64,
    ) -> anyhow::Result<String>;

    async fn delete(&self, bucket: &str, path: &str) -> anyhow::Result<()>;
}
