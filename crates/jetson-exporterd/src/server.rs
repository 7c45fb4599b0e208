//! HTTP scrape endpoint.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/metrics` | Prometheus exposition of the registry |
//! | GET | `/healthz` | 200 while the poller is collecting, 503 after it stopped |

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use jetson_metrics::{CONTENT_TYPE, MetricRegistry};

/// Shared state for the handlers.
#[derive(Clone)]
pub struct ServerState {
    pub registry: Arc<MetricRegistry>,
    /// Cleared when the poller loop ends.
    pub collecting: Arc<AtomicBool>,
}

impl ServerState {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self {
            registry,
            collecting: Arc::new(AtomicBool::new(true)),
        }
    }
}

pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// GET /metrics
pub async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    let body = state.registry.render();
    (StatusCode::OK, [("content-type", CONTENT_TYPE)], body)
}

/// GET /healthz
pub async fn healthz(State(state): State<ServerState>) -> impl IntoResponse {
    if state.collecting.load(Ordering::Relaxed) {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "collector stopped")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn metrics_endpoint_returns_text() {
        let state = ServerState::new(Arc::new(MetricRegistry::new()));
        let resp = metrics(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/plain; version=0.0.4"));
    }

    #[tokio::test]
    async fn healthz_tracks_collector() {
        let state = ServerState::new(Arc::new(MetricRegistry::new()));
        let resp = healthz(State(state.clone())).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        state.collecting.store(false, Ordering::Relaxed);
        let resp = healthz(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
