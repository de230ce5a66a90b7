//! Router assembly and startup wiring. `build_app` is pure (used by tests),
//! `start` constructs the production collaborators from config and serves.

use std::sync::Arc;

use {
    anyhow::Context,
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{delete, get, post},
    },
    secrecy::Secret,
    tower_http::{cors::CorsLayer, trace::TraceLayer},
    tracing::info,
};

use {
    phonotek_config::PhonotekConfig,
    phonotek_retrieval::{OpenAiEmbedder, ResilientEmbedder},
    phonotek_store::{RestObjectStore, RestStore},
    phonotek_voice::{LocalWhisperStt, SttProvider, WhisperStt},
};

use crate::{handlers, ingest, state::AppState};

pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/api/users/{id}", get(handlers::get_user))
        .route(
            "/api/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/api/posts/{id}",
            get(handlers::get_post)
                .patch(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route("/api/posts/{id}/audio", post(ingest::upload_audio))
        .route("/api/posts/{id}/files", get(handlers::list_post_files))
        .route(
            "/api/posts/{id}/metadata",
            get(handlers::list_metadata).put(handlers::put_metadata),
        )
        .route("/api/metadata/{id}", delete(handlers::delete_metadata))
        .route(
            "/api/posts/{id}/rights",
            get(handlers::list_rights).post(handlers::create_right),
        )
        .route("/api/rights/{id}", delete(handlers::delete_right))
        .route("/api/files/{id}/url", get(handlers::file_url))
        .route(
            "/api/files/{id}",
            delete(handlers::delete_file),
        )
        .route("/api/audit", get(handlers::list_audit))
        .route("/api/rag/search", get(handlers::rag_search))
        // axum caps request bodies at 2 MiB by default, far below a real
        // recording; the upload path enforces its own ceiling.
        .layer(DefaultBodyLimit::max(ingest::MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wire up production collaborators from config and serve until shutdown.
pub async fn start(config: PhonotekConfig) -> anyhow::Result<()> {
    if config.platform.url.is_empty() {
        anyhow::bail!("platform.url is not configured");
    }
    if config.platform.service_key.is_empty() {
        anyhow::bail!("platform.service_key is not configured");
    }

    let service_key = Secret::new(config.platform.service_key.clone());
    let mut store = RestStore::new(&config.platform.url, service_key.clone());
    // An empty rpc name in the file means "the platform has no vector
    // function"; rank locally in that case.
    let vector_rpc = config
        .platform
        .vector_rpc
        .as_deref()
        .filter(|s| !s.is_empty());
    if let Some(rpc) = vector_rpc {
        store = store.with_vector_rpc(rpc);
    }
    let store = Arc::new(store);
    let objects = Arc::new(RestObjectStore::new(&config.platform.url, service_key));

    let remote = config.embeddings.api_key.as_ref().map(|key| {
        OpenAiEmbedder::new(Secret::new(key.clone()))
            .with_model(&config.embeddings.model, config.embeddings.dimensions)
    });
    let has_remote = remote.is_some();
    let embedder = Arc::new(ResilientEmbedder::new(remote, config.embeddings.dimensions));

    let stt: Arc<dyn SttProvider> = match config.stt.provider.as_str() {
        "local" => {
            let model = config
                .stt
                .local_model_path
                .clone()
                .context("stt.local_model_path is required for the local provider")?;
            Arc::new(LocalWhisperStt::new(model))
        }
        _ => Arc::new(WhisperStt::new(
            config.stt.api_key.as_ref().map(|k| Secret::new(k.clone())),
        )),
    };
    if !stt.is_configured() {
        anyhow::bail!("stt provider '{}' is not fully configured", stt.id());
    }

    let state = Arc::new(AppState {
        store: store.clone(),
        index: store,
        objects,
        stt,
        embedder,
        audio_bucket: config.platform.audio_bucket.clone(),
        signed_url_ttl_secs: AppState::DEFAULT_SIGNED_URL_TTL_SECS,
    });

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    info!(
        addr,
        vector_rpc = vector_rpc.unwrap_or("(local ranking)"),
        remote_embeddings = has_remote,
        "phonotek listening"
    );
    axum::serve(listener, build_app(state))
        .await
        .context("server error")
}
