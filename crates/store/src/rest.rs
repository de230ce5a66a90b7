//! REST client for the managed platform: PostgREST-style row access under
//! `/rest/v1`, an RPC endpoint for server-side nearest-neighbor search, and
//! bucket object storage under `/storage/v1`.

use {
    anyhow::{Context, anyhow},
    async_trait::async_trait,
    bytes::Bytes,
    reqwest::{Client, RequestBuilder},
    secrecy::{ExposeSecret, Secret},
    serde::de::DeserializeOwned,
    tracing::debug,
};

use crate::{
    pagination,
    rows::{
        AuditEntry, FileRecord, MetadataEntry, NewAudit, NewChunk, NewFile, NewMetadata, NewPost,
        NewRightsGrant, NewUser, Post, PostPatch, RagChunk, RightsGrant, User,
    },
    traits::{ArchiveStore, ChunkIndex, ObjectStore},
};

// ── Row store ────────────────────────────────────────────────────────────────

pub struct RestStore {
    client: Client,
    base_url: String,
    service_key: Secret<String>,
    /// Name of the server-side nearest-neighbor RPC, when the platform has one.
    vector_rpc: Option<String>,
}

impl std::fmt::Debug for RestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStore")
            .field("base_url", &self.base_url)
            .field("service_key", &"[REDACTED]")
            .field("vector_rpc", &self.vector_rpc)
            .finish()
    }
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, service_key: Secret<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key,
            vector_rpc: None,
        }
    }

    /// Enable server-side nearest-neighbor search via the named RPC.
    #[must_use]
    pub fn with_vector_rpc(mut self, rpc: impl Into<String>) -> Self {
        self.vector_rpc = Some(rpc.into());
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", self.service_key.expose_secret())
            .bearer_auth(self.service_key.expose_secret())
    }

    async fn rows<T: DeserializeOwned>(&self, req: RequestBuilder) -> anyhow::Result<Vec<T>> {
        let resp = self.authed(req).send().await.context("store request")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("store request failed: {status} - {body}"));
        }
        Ok(resp.json().await.context("decode store response")?)
    }

    /// Insert one row and return the stored representation.
    async fn insert_returning<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &impl serde::Serialize,
    ) -> anyhow::Result<T> {
        let req = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(body);
        self.rows::<T>(req)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("insert into {table} returned no rows"))
    }

    /// Fire-and-forget write (insert without representation, or delete).
    async fn execute(&self, req: RequestBuilder) -> anyhow::Result<()> {
        let resp = self.authed(req).send().await.context("store request")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("store request failed: {status} - {body}"));
        }
        Ok(())
    }

    fn range_params(page: usize, limit: usize) -> [(&'static str, String); 2] {
        [
            ("limit", limit.to_string()),
            ("offset", pagination::offset(page, limit).to_string()),
        ]
    }
}

#[async_trait]
impl ArchiveStore for RestStore {
    async fn create_user(&self, user: &NewUser) -> anyhow::Result<User> {
        self.insert_returning("users", user).await
    }

    async fn get_user(&self, user_id: i64) -> anyhow::Result<Option<User>> {
        let req = self
            .client
            .get(self.table_url("users"))
            .query(&[("user_id", format!("eq.{user_id}")), ("select", "*".into())]);
        Ok(self.rows::<User>(req).await?.into_iter().next())
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let req = self
            .client
            .get(self.table_url("users"))
            .query(&[("username", format!("eq.{username}")), ("select", "*".into())]);
        Ok(self.rows::<User>(req).await?.into_iter().next())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let req = self
            .client
            .get(self.table_url("users"))
            .query(&[("email", format!("eq.{email}")), ("select", "*".into())]);
        Ok(self.rows::<User>(req).await?.into_iter().next())
    }

    async fn list_users(&self, page: usize, limit: usize) -> anyhow::Result<Vec<User>> {
        let req = self
            .client
            .get(self.table_url("users"))
            .query(&[("select", "*"), ("order", "user_id.asc")])
            .query(&Self::range_params(page, limit));
        self.rows(req).await
    }

    async fn create_post(&self, post: &NewPost) -> anyhow::Result<Post> {
        self.insert_returning("posts", post).await
    }

    async fn get_post(&self, post_id: i64) -> anyhow::Result<Option<Post>> {
        let req = self
            .client
            .get(self.table_url("posts"))
            .query(&[("post_id", format!("eq.{post_id}")), ("select", "*".into())]);
        Ok(self.rows::<Post>(req).await?.into_iter().next())
    }

    async fn list_posts(
        &self,
        owner: Option<i64>,
        viewer: Option<i64>,
        page: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<Post>> {
        let mut req = self
            .client
            .get(self.table_url("posts"))
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .query(&Self::range_params(page, limit));
        if let Some(owner) = owner {
            req = req.query(&[("user_id", format!("eq.{owner}"))]);
        }
        // Privacy: public rows, plus the viewer's own.
        match viewer {
            Some(viewer) => {
                req = req.query(&[(
                    "or",
                    format!("(is_private.eq.false,user_id.eq.{viewer})"),
                )]);
            },
            None => {
                req = req.query(&[("is_private", "eq.false")]);
            },
        }
        self.rows(req).await
    }

    async fn update_post(&self, post_id: i64, patch: &PostPatch) -> anyhow::Result<Option<Post>> {
        let req = self
            .client
            .patch(self.table_url("posts"))
            .query(&[("post_id", format!("eq.{post_id}"))])
            .header("Prefer", "return=representation")
            .json(patch);
        Ok(self.rows::<Post>(req).await?.into_iter().next())
    }

    async fn delete_post(&self, post_id: i64) -> anyhow::Result<()> {
        let req = self
            .client
            .delete(self.table_url("posts"))
            .query(&[("post_id", format!("eq.{post_id}"))]);
        self.execute(req).await
    }

    async fn insert_file(&self, file: &NewFile) -> anyhow::Result<FileRecord> {
        self.insert_returning("files", file).await
    }

    async fn get_file(&self, file_id: i64) -> anyhow::Result<Option<FileRecord>> {
        let req = self
            .client
            .get(self.table_url("files"))
            .query(&[("file_id", format!("eq.{file_id}")), ("select", "*".into())]);
        Ok(self.rows::<FileRecord>(req).await?.into_iter().next())
    }

    async fn list_files_for_post(&self, post_id: i64) -> anyhow::Result<Vec<FileRecord>> {
        let req = self
            .client
            .get(self.table_url("files"))
            .query(&[
                ("post_id", format!("eq.{post_id}")),
                ("select", "*".into()),
                ("order", "file_id.asc".into()),
            ]);
        self.rows(req).await
    }

    async fn delete_file(&self, file_id: i64) -> anyhow::Result<()> {
        let req = self
            .client
            .delete(self.table_url("files"))
            .query(&[("file_id", format!("eq.{file_id}"))]);
        self.execute(req).await
    }

    async fn upsert_metadata(&self, entries: &[NewMetadata]) -> anyhow::Result<Vec<MetadataEntry>> {
        let req = self
            .client
            .post(self.table_url("metadata"))
            .header("Prefer", "return=representation,resolution=merge-duplicates")
            .json(entries);
        self.rows(req).await
    }

    async fn get_metadata(&self, metadata_id: i64) -> anyhow::Result<Option<MetadataEntry>> {
        let req = self
            .client
            .get(self.table_url("metadata"))
            .query(&[
                ("metadata_id", format!("eq.{metadata_id}")),
                ("select", "*".into()),
            ]);
        Ok(self.rows::<MetadataEntry>(req).await?.into_iter().next())
    }

    async fn list_metadata(&self, post_id: i64) -> anyhow::Result<Vec<MetadataEntry>> {
        let req = self
            .client
            .get(self.table_url("metadata"))
            .query(&[("post_id", format!("eq.{post_id}")), ("select", "*".into())]);
        self.rows(req).await
    }

    async fn delete_metadata(&self, metadata_id: i64) -> anyhow::Result<()> {
        let req = self
            .client
            .delete(self.table_url("metadata"))
            .query(&[("metadata_id", format!("eq.{metadata_id}"))]);
        self.execute(req).await
    }

    async fn insert_right(&self, grant: &NewRightsGrant) -> anyhow::Result<RightsGrant> {
        self.insert_returning("rights", grant).await
    }

    async fn get_right(&self, grant_id: i64) -> anyhow::Result<Option<RightsGrant>> {
        let req = self
            .client
            .get(self.table_url("rights"))
            .query(&[("grant_id", format!("eq.{grant_id}")), ("select", "*".into())]);
        Ok(self.rows::<RightsGrant>(req).await?.into_iter().next())
    }

    async fn list_rights(&self, post_id: i64) -> anyhow::Result<Vec<RightsGrant>> {
        let req = self
            .client
            .get(self.table_url("rights"))
            .query(&[("post_id", format!("eq.{post_id}")), ("select", "*".into())]);
        self.rows(req).await
    }

    async fn delete_right(&self, grant_id: i64) -> anyhow::Result<()> {
        let req = self
            .client
            .delete(self.table_url("rights"))
            .query(&[("grant_id", format!("eq.{grant_id}"))]);
        self.execute(req).await
    }

    async fn insert_audit(&self, entry: &NewAudit) -> anyhow::Result<()> {
        let req = self.client.post(self.table_url("audit_log")).json(entry);
        self.execute(req).await
    }

    async fn list_audit(
        &self,
        user_id: i64,
        page: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<AuditEntry>> {
        let req = self
            .client
            .get(self.table_url("audit_log"))
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("select", "*".into()),
                ("order", "created_at.desc".into()),
            ])
            .query(&Self::range_params(page, limit));
        self.rows(req).await
    }

    async fn insert_chunks(&self, chunks: &[NewChunk]) -> anyhow::Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let req = self.client.post(self.table_url("rag_chunks")).json(chunks);
        self.execute(req).await
    }
}

#[async_trait]
impl ChunkIndex for RestStore {
    fn server_side_ranking(&self) -> bool {
        self.vector_rpc.is_some()
    }

    async fn nearest_chunks(
        &self,
        user_id: i64,
        query: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<RagChunk>> {
        let rpc = self
            .vector_rpc
            .as_deref()
            .ok_or_else(|| anyhow!("no nearest-neighbor RPC configured"))?;
        debug!(rpc, user_id, limit, "server-side vector search");
        let req = self
            .client
            .post(format!("{}/rest/v1/rpc/{rpc}", self.base_url))
            .json(&serde_json::json!({
                "query_embedding": query,
                "match_user": user_id,
                "match_count": limit,
            }));
        self.rows(req).await
    }

    async fn text_search_chunks(
        &self,
        user_id: i64,
        query: &str,
        page: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<RagChunk>> {
        // Scope to the user's posts via an embedded filter on the posts join.
        let req = self
            .client
            .get(self.table_url("rag_chunks"))
            .query(&[
                ("select", "*,posts!inner(user_id)".to_string()),
                ("posts.user_id", format!("eq.{user_id}")),
                ("text", format!("ilike.*{query}*")),
                ("order", "chunk_id.asc".to_string()),
            ])
            .query(&Self::range_params(page, limit));
        self.rows(req).await
    }

    async fn chunks_for_user(&self, user_id: i64, max: usize) -> anyhow::Result<Vec<RagChunk>> {
        let req = self
            .client
            .get(self.table_url("rag_chunks"))
            .query(&[
                ("select", "*,posts!inner(user_id)".to_string()),
                ("posts.user_id", format!("eq.{user_id}")),
                ("order", "chunk_id.asc".to_string()),
                ("limit", max.to_string()),
            ]);
        self.rows(req).await
    }
}

// ── Object store ─────────────────────────────────────────────────────────────

pub struct RestObjectStore {
    client: Client,
    base_url: String,
    service_key: Secret<String>,
}

impl std::fmt::Debug for RestObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestObjectStore")
            .field("base_url", &self.base_url)
            .field("service_key", &"[REDACTED]")
            .finish()
    }
}

impl RestObjectStore {
    pub fn new(base_url: impl Into<String>, service_key: Secret<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key,
        }
    }

    fn object_url(&self, prefix: &str, bucket: &str, path: &str) -> String {
        // Path segments are caller-controlled; encode each one.
        let encoded: Vec<String> = path
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect();
        format!(
            "{}/storage/v1/{prefix}/{bucket}/{}",
            self.base_url,
            encoded.join("/")
        )
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", self.service_key.expose_secret())
            .bearer_auth(self.service_key.expose_secret())
    }
}

#[derive(serde::Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[async_trait]
impl ObjectStore for RestObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> anyhow::Result<String> {
        let url = self.object_url("object", bucket, path);
        let resp = self
            .authed(self.client.post(&url))
            .header("content-type", content_type)
            .body(data)
            .send()
            .await
            .context("object upload")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("object upload failed: {status} - {body}"));
        }
        debug!(bucket, path, "uploaded object");
        Ok(format!("{bucket}/{path}"))
    }

    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_secs: u64,
    ) -> anyhow::Result<String> {
        let url = self.object_url("object/sign", bucket, path);
        let resp = self
            .authed(self.client.post(&url))
            .json(&serde_json::json!({ "expiresIn": expires_secs }))
            .send()
            .await
            .context("sign object url")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("sign url failed: {status} - {body}"));
        }
        let signed: SignedUrlResponse = resp.json().await.context("decode signed url")?;
        // The platform returns a path relative to /storage/v1.
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }

    async fn delete(&self, bucket: &str, path: &str) -> anyhow::Result<()> {
        let url = self.object_url("object", bucket, path);
        let resp = self
            .authed(self.client.delete(&url))
            .send()
            .await
            .context("object delete")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("object delete failed: {status} - {body}"));
        }
        Ok(())
    }
}
