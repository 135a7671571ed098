//! SSE streaming collection trigger.
//!
//! GET /api/collect/stream?searchText=...&locationText=...
//!
//! Starts a collection run and forwards its ordered progress events as
//! named SSE events (`log`, `error`, `complete`). The stream closes after
//! the terminal event: the run task drops its sender when it finishes.

use std::convert::Infallible;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use collector::{ProgressEvent, SearchRequest};

use crate::app::AppState;
use crate::routes::collect::build_collector;

pub async fn collect_stream_handler(
    Extension(state): Extension<AppState>,
    Query(request): Query<SearchRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let mut collector = build_collector(&state.config).await.map_err(|e| {
        tracing::error!(error = %e, "failed to build session pool");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let (tx, rx) = mpsc::channel::<ProgressEvent>(64);

    tokio::spawn(async move {
        if let Err(e) = collector.run(&request, Some(tx.clone())).await {
            tracing::error!(error = %e, "collection run failed");
            let _ = tx.send(ProgressEvent::Error {
                message: e.to_string(),
            })
            .await;
        }
    });

    let events = ReceiverStream::new(rx).filter_map(|event| async move {
        Event::default()
            .event(event.event_name())
            .json_data(&event)
            .ok()
            .map(Ok)
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
