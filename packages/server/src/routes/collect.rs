//! Synchronous collection trigger.
//!
//! POST /api/collect
//!
//! Runs one full collection pass and answers with the run summary once it
//! finishes. Long-running by nature; streaming consumers should use the
//! SSE endpoint instead.

use axum::{extract::Extension, http::StatusCode, Json};
use serde_json::json;

use collector::{
    ArchiveStore, Collector, CollectorConfig, FsObjectStore, HttpSession, RunSummary,
    SearchRequest, TtlCache,
};

use crate::app::AppState;
use crate::config::Config;

/// Assemble a collector wired to the filesystem archive backend. Each
/// trigger gets its own session pool; sessions are not reused across runs.
pub async fn build_collector(
    config: &Config,
) -> Result<Collector<HttpSession, FsObjectStore>, collector::FetchError> {
    let collector_config = CollectorConfig::new()
        .with_max_pages(config.max_pages)
        .with_pool_size(config.pool_size)
        .with_nav_timeout(config.nav_timeout);

    let list_session = HttpSession::new(config.nav_timeout)?;
    let detail_sessions = HttpSession::pool(config.pool_size, config.nav_timeout)?;

    let archive = ArchiveStore::load(FsObjectStore::new(&config.archive_root)).await;
    let mut ttl_cache = TtlCache::new(&config.cache_path, collector_config.cache_ttl);
    ttl_cache.load().await;

    Ok(Collector::new(
        collector_config,
        list_session,
        detail_sessions,
        archive,
        ttl_cache,
        None,
    ))
}

pub async fn collect_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<RunSummary>, (StatusCode, Json<serde_json::Value>)> {
    let mut collector = build_collector(&state.config).await.map_err(|e| {
        tracing::error!(error = %e, "failed to build session pool");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("session pool: {}", e) })),
        )
    })?;

    let summary = collector.run(&request, None).await.map_err(|e| {
        tracing::error!(error = %e, "collection run failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(Json(summary))
}
