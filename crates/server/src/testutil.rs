//! In-memory collaborators for handler and pipeline tests. `MemStore` backs
//! all three storage traits at once so a test sees consistent state across
//! rows, chunks, and objects.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use {anyhow::anyhow, async_trait::async_trait, bytes::Bytes};

use {
    phonotek_retrieval::HashEmbedder,
    phonotek_store::{
        ArchiveStore, AuditEntry, ChunkIndex, FileRecord, MetadataEntry, NewAudit, NewChunk,
        NewFile, NewMetadata, NewPost, NewRightsGrant, NewUser, ObjectStore, Post, PostPatch,
        RagChunk, RightsGrant, User, pagination,
    },
    phonotek_voice::{Segment, SttProvider, TranscribeRequest, Transcript},
};

use crate::state::AppState;

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub(crate) fn user_fixture(user_id: i64) -> User {
    User {
        user_id,
        username: format!("user{user_id}"),
        email: format!("user{user_id}@example.com"),
        display_name: None,
        created_at: None,
    }
}

pub(crate) fn post_fixture(post_id: i64, user_id: i64) -> Post {
    Post {
        post_id,
        user_id,
        title: format!("post {post_id}"),
        is_private: false,
        status: phonotek_store::PostStatus::Processing,
        audio_url: None,
        transcribed_text: None,
        duration_secs: None,
        created_at: None,
        updated_at: None,
    }
}

// ── MemStore ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    posts: BTreeMap<i64, Post>,
    files: BTreeMap<i64, FileRecord>,
    metadata: BTreeMap<i64, MetadataEntry>,
    rights: BTreeMap<i64, RightsGrant>,
    audit: Vec<AuditEntry>,
    chunks: Vec<RagChunk>,
    objects: BTreeMap<String, Bytes>,
    next_id: i64,
}

impl Inner {
    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub(crate) struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn chunks(&self) -> Vec<RagChunk> {
        self.inner.lock().unwrap().chunks.clone()
    }

    pub fn audit(&self) -> Vec<AuditEntry> {
        self.inner.lock().unwrap().audit.clone()
    }

    pub fn object_keys(&self) -> Vec<String> {
        self.inner.lock().unwrap().objects.keys().cloned().collect()
    }

    fn page<T: Clone>(rows: Vec<T>, page: usize, limit: usize) -> Vec<T> {
        rows.into_iter()
            .skip(pagination::offset(page, limit))
            .take(limit)
            .collect()
    }
}

#[async_trait]
impl ArchiveStore for MemStore {
    async fn create_user(&self, user: &NewUser) -> anyhow::Result<User> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next();
        let row = User {
            user_id: id,
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            created_at: None,
        };
        inner.users.insert(id, row.clone());
        Ok(row)
    }

    async fn get_user(&self, user_id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.inner.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self, page: usize, limit: usize) -> anyhow::Result<Vec<User>> {
        let rows: Vec<User> = self.inner.lock().unwrap().users.values().cloned().collect();
        Ok(Self::page(rows, page, limit))
    }

    async fn create_post(&self, post: &NewPost) -> anyhow::Result<Post> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next();
        let row = Post {
            post_id: id,
            user_id: post.user_id,
            title: post.title.clone(),
            is_private: post.is_private,
            status: post.status,
            audio_url: None,
            transcribed_text: None,
            duration_secs: None,
            created_at: None,
            updated_at: None,
        };
        inner.posts.insert(id, row.clone());
        Ok(row)
    }

    async fn get_post(&self, post_id: i64) -> anyhow::Result<Option<Post>> {
        Ok(self.inner.lock().unwrap().posts.get(&post_id).cloned())
    }

    async fn list_posts(
        &self,
        owner: Option<i64>,
        viewer: Option<i64>,
        page: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Post>> {
        let rows: Vec<Post> = self
            .inner
            .lock()
            .unwrap()
            .posts
            .values()
            .filter(|p| owner.is_none_or(|o| p.user_id == o))
            .filter(|p| !p.is_private || viewer == Some(p.user_id))
            .cloned()
            .collect();
        Ok(Self::page(rows, page, limit))
    }

    async fn update_post(&self, post_id: i64, patch: &PostPatch) -> anyhow::Result<Option<Post>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(post) = inner.posts.get_mut(&post_id) else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            post.title = title.clone();
        }
        if let Some(is_private) = patch.is_private {
            post.is_private = is_private;
        }
        if let Some(status) = patch.status {
            post.status = status;
        }
        if let Some(audio_url) = &patch.audio_url {
            post.audio_url = Some(audio_url.clone());
        }
        if let Some(text) = &patch.transcribed_text {
            post.transcribed_text = Some(text.clone());
        }
        if let Some(duration) = patch.duration_secs {
            post.duration_secs = Some(duration);
        }
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, post_id: i64) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.posts.remove(&post_id);
        inner.files.retain(|_, f| f.post_id != post_id);
        inner.metadata.retain(|_, m| m.post_id != post_id);
        inner.rights.retain(|_, r| r.post_id != post_id);
        inner.chunks.retain(|c| c.post_id != post_id);
        Ok(())
    }

    async fn insert_file(&self, file: &NewFile) -> anyhow::Result<FileRecord> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next();
        let row = FileRecord {
            file_id: id,
            post_id: file.post_id,
            bucket: file.bucket.clone(),
            path: file.path.clone(),
            content_type: file.content_type.clone(),
            size_bytes: file.size_bytes,
            created_at: None,
        };
        inner.files.insert(id, row.clone());
        Ok(row)
    }

    async fn get_file(&self, file_id: i64) -> anyhow::Result<Option<FileRecord>> {
        Ok(self.inner.lock().unwrap().files.get(&file_id).cloned())
    }

    async fn list_files_for_post(&self, post_id: i64) -> anyhow::Result<Vec<FileRecord>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .files
            .values()
            .filter(|f| f.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn delete_file(&self, file_id: i64) -> anyhow::Result<()> {
        self.inner.lock().unwrap().files.remove(&file_id);
        Ok(())
    }

    async fn upsert_metadata(&self, entries: &[NewMetadata]) -> anyhow::Result<Vec<MetadataEntry>> {
        let mut inner = self.inner.lock().unwrap();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let existing = inner
                .metadata
                .values()
                .find(|m| m.post_id == entry.post_id && m.key == entry.key)
                .map(|m| m.metadata_id);
            let id = match existing {
                Some(id) => id,
                None => inner.next(),
            };
            let row = MetadataEntry {
                metadata_id: id,
                post_id: entry.post_id,
                key: entry.key.clone(),
                value: entry.value.clone(),
            };
            inner.metadata.insert(id, row.clone());
            out.push(row);
        }
        Ok(out)
    }

    async fn get_metadata(&self, metadata_id: i64) -> anyhow::Result<Option<MetadataEntry>> {
        Ok(self.inner.lock().unwrap().metadata.get(&metadata_id).cloned())
    }

    async fn list_metadata(&self, post_id: i64) -> anyhow::Result<Vec<MetadataEntry>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .metadata
            .values()
            .filter(|m| m.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn delete_metadata(&self, metadata_id: i64) -> anyhow::Result<()> {
        self.inner.lock().unwrap().metadata.remove(&metadata_id);
        Ok(())
    }

    async fn insert_right(&self, grant: &NewRightsGrant) -> anyhow::Result<RightsGrant> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next();
        let row = RightsGrant {
            grant_id: id,
            post_id: grant.post_id,
            user_id: grant.user_id,
            access: grant.access,
        };
        inner.rights.insert(id, row.clone());
        Ok(row)
    }

    async fn get_right(&self, grant_id: i64) -> anyhow::Result<Option<RightsGrant>> {
        Ok(self.inner.lock().unwrap().rights.get(&grant_id).cloned())
    }

    async fn list_rights(&self, post_id: i64) -> anyhow::Result<Vec<RightsGrant>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .rights
            .values()
            .filter(|r| r.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn delete_right(&self, grant_id: i64) -> anyhow::Result<()> {
        self.inner.lock().unwrap().rights.remove(&grant_id);
        Ok(())
    }

    async fn insert_audit(&self, entry: &NewAudit) -> anyhow::Result<()> {
        self.inner.lock().unwrap().audit.push(AuditEntry {
            audit_id: entry.audit_id.clone(),
            user_id: entry.user_id,
            action: entry.action.clone(),
            detail: entry.detail.clone(),
            created_at: None,
        });
        Ok(())
    }

    async fn list_audit(
        &self,
        user_id: i64,
        page: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<AuditEntry>> {
        let rows: Vec<AuditEntry> = self
            .inner
            .lock()
            .unwrap()
            .audit
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        Ok(Self::page(rows, page, limit))
    }

    async fn insert_chunks(&self, chunks: &[NewChunk]) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for chunk in chunks {
            let id = inner.next();
            inner.chunks.push(RagChunk {
                chunk_id: id,
                post_id: chunk.post_id,
                start_sec: chunk.start_sec,
                end_sec: chunk.end_sec,
                text: chunk.text.clone(),
                confidence: chunk.confidence,
                embedding: Some(chunk.embedding.clone()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChunkIndex for MemStore {
    fn server_side_ranking(&self) -> bool {
        false
    }

    async fn nearest_chunks(
        &self,
        _user_id: i64,
        _query: &[f32],
        _limit: usize,
    ) -> anyhow::Result<Vec<RagChunk>> {
        Err(anyhow!("no server-side ranking in MemStore"))
    }

    async fn text_search_chunks(
        &self,
        user_id: i64,
        query: &str,
        page: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<RagChunk>> {
        let needle = query.to_lowercase();
        let inner = self.inner.lock().unwrap();
        let rows: Vec<RagChunk> = inner
            .chunks
            .iter()
            .filter(|c| {
                inner
                    .posts
                    .get(&c.post_id)
                    .is_some_and(|p| p.user_id == user_id)
            })
            .filter(|c| c.text.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(Self::page(rows, page, limit))
    }

    async fn chunks_for_user(&self, user_id: i64, max: usize) -> anyhow::Result<Vec<RagChunk>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .chunks
            .iter()
            .filter(|c| {
                inner
                    .posts
                    .get(&c.post_id)
                    .is_some_and(|p| p.user_id == user_id)
            })
            .take(max)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ObjectStore for MemStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        _content_type: &str,
    ) -> anyhow::Result<String> {
        let key = format!("{bucket}/{path}");
        self.inner.lock().unwrap().objects.insert(key.clone(), data);
        Ok(key)
    }

    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_secs: u64,
    ) -> anyhow::Result<String> {
        Ok(format!(
            "https://objects.test/{bucket}/{path}?expires={expires_secs}"
        ))
    }

    async fn delete(&self, bucket: &str, path: &str) -> anyhow::Result<()> {
        let key = format!("{bucket}/{path}");
        self.inner.lock().unwrap().objects.remove(&key);
        Ok(())
    }
}

// ── STT stub ─────────────────────────────────────────────────────────────────

struct StubStt {
    transcript: Option<Transcript>,
    fail: bool,
}

#[async_trait]
impl SttProvider for StubStt {
    fn id(&self) -> &'static str {
        "stub"
    }

    fn name(&self) -> &'static str {
        "Stub STT"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn transcribe(&self, _request: TranscribeRequest) -> anyhow::Result<Transcript> {
        if self.fail {
            return Err(anyhow!("transcription backend unavailable"));
        }
        Ok(self.transcript.clone().unwrap_or_else(|| Transcript {
            text: "hello world".into(),
            language: Some("en".into()),
            duration_secs: Some(1.0),
            segments: vec![Segment {
                start_sec: 0.0,
                end_sec: 1.0,
                text: "hello world".into(),
                confidence: Some(0.95),
            }],
        }))
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

pub(crate) struct TestState {
    mem: Arc<MemStore>,
    transcript: Option<Transcript>,
    fail_stt: bool,
}

impl TestState {
    pub fn new() -> Self {
        Self {
            mem: Arc::new(MemStore::default()),
            transcript: None,
            fail_stt: false,
        }
    }

    pub fn with_user(self, user: User) -> Self {
        {
            let mut inner = self.mem.inner.lock().unwrap();
            inner.next_id = inner.next_id.max(user.user_id);
            inner.users.insert(user.user_id, user);
        }
        self
    }

    pub fn with_post(self, post: Post) -> Self {
        let owner = user_fixture(post.user_id);
        let this = self.with_user(owner);
        {
            let mut inner = this.mem.inner.lock().unwrap();
            inner.next_id = inner.next_id.max(post.post_id);
            inner.posts.insert(post.post_id, post);
        }
        this
    }

    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn failing_stt(mut self) -> Self {
        self.fail_stt = true;
        self
    }

    /// Handle onto the shared in-memory store, for post-hoc assertions.
    pub fn mem(&self) -> Arc<MemStore> {
        Arc::clone(&self.mem)
    }

    pub fn build(self) -> Arc<AppState> {
        Arc::new(AppState {
            store: self.mem.clone(),
            index: self.mem.clone(),
            objects: self.mem.clone(),
            stt: Arc::new(StubStt {
                transcript: self.transcript,
                fail: self.fail_stt,
            }),
            embedder: Arc::new(HashEmbedder::new(16)),
            audio_bucket: "audio".into(),
            signed_url_ttl_secs: AppState::DEFAULT_SIGNED_URL_TTL_SECS,
        })
    }
}
