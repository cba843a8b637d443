//! HTTP surface for the sentiment pipeline.
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use pulse_analysis::SentimentPipeline;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub mod handlers;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SentimentPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<SentimentPipeline>) -> Self {
        Self { pipeline }
    }
}

async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %uri,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "web.access"
    );
    response
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/sentiment", get(handlers::sentiment))
        .route("/", post(handlers::sentiment_form))
        .route("/sentiment-data", get(handlers::sentiment_data))
        .with_state(state)
        .layer(axum::middleware::from_fn(access_log))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::debug_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
}

/// Bind `host:port` and serve until `shutdown` is cancelled.
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "web.listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("web server stopped")?;

    tracing::info!("web.stopped");
    Ok(())
}
