// Copyright 2026 wcagscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP API for the server-mediated scan path.
//!
//! `POST /scan {url}` runs a scan on this process's Chromium and answers with
//! the [`ScanReport`](crate::report::ScanReport) or a classified error body.
//! The `/api/*` aliases keep older clients working.

use crate::classify::{ErrorBody, ErrorKind, ScanError};
use crate::events::{self, EventBus};
use crate::scanner::Scanner;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

/// Shared state behind every handler.
pub struct AppState {
    pub scanner: Arc<Scanner>,
    pub event_bus: Arc<EventBus>,
    pub started_at: Instant,
    pub chromium_available: bool,
}

impl AppState {
    pub fn new(scanner: Arc<Scanner>, event_bus: Arc<EventBus>, chromium_available: bool) -> Self {
        Self {
            scanner,
            event_bus,
            started_at: Instant::now(),
            chromium_available,
        }
    }
}

/// Build the axum Router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/scan", post(handle_scan))
        .route("/api/scan", post(handle_scan))
        .route("/health", get(health))
        .route("/api/health", get(health))
        .route("/status", get(handle_status))
        .route("/events", get(events_sse))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on `127.0.0.1:port` and run until `shutdown`
/// resolves.
pub async fn start(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;
    serve(listener, state, shutdown).await
}

/// Serve on an already-bound listener.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    tracing::info!("scan API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────

fn error_response(err: &ScanError) -> Response {
    let status =
        StatusCode::from_u16(err.status_or_default()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorBody::from(err))).into_response()
}

#[derive(Debug, Deserialize)]
struct ScanRequest {
    #[serde(default)]
    url: Option<String>,
}

// ── Handlers ────────────────────────────────────────────────────

/// Scan one URL. Dropping the connection drops this future, which cancels
/// the scan and releases its render context.
async fn handle_scan(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> Response {
    let url = match body {
        Ok(Json(ScanRequest { url: Some(url) })) if !url.trim().is_empty() => url,
        Ok(_) => {
            let err = ScanError::new(ErrorKind::InvalidUrl, "").with_details("URL is required");
            return error_response(&err);
        }
        Err(rejection) => {
            let err = ScanError::new(ErrorKind::InvalidUrl, "").with_details(rejection.body_text());
            return error_response(&err);
        }
    };

    match state.scanner.submit(&url).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": events::now_timestamp(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let manager = state.scanner.manager();
    Json(serde_json::json!({
        "running": true,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs_f64(),
        "renderer": manager.renderer().name(),
        "chromium_available": state.chromium_available,
        "active_contexts": manager.renderer().active_contexts(),
        "in_flight": manager.in_flight(),
        "max_concurrent": manager.ceiling(),
        "path": state.scanner.path(),
    }))
}

/// SSE query parameters.
#[derive(Deserialize, Default)]
struct EventsParams {
    url: Option<String>,
}

/// Server-Sent Events stream of scan lifecycle events, optionally filtered
/// with `?url=`.
async fn events_sse(
    Query(params): Query<EventsParams>,
    State(state): State<Arc<AppState>>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_bus.subscribe();
    let url_filter = params.url;

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(ref url) = url_filter {
                        if !events::event_matches_url(&event, url) {
                            continue;
                        }
                    }
                    if let Ok(json) = serde_json::to_string(&event) {
                        yield Ok(Event::default().data(json));
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
