use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub mod auth;
pub mod fun_facts;
pub mod health;
pub mod stories;

/// Request bodies are small JSON documents.
const BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Builds the HTTP surface. `/metrics` is only mounted when a Prometheus
/// recorder is installed.
pub fn router(state: AppState, prometheus: Option<Arc<PrometheusHandle>>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health::health_check))
        .route("/generateStory", post(stories::generate_story))
        .route("/story/{id}/status", get(stories::story_status))
        .route("/story/{id}/viewed", put(stories::mark_viewed))
        .route("/my-stories", get(stories::my_stories))
        .route("/generateFunFacts", post(fun_facts::generate_fun_facts))
        .with_state(state);

    if let Some(handle) = prometheus {
        app = app.route("/metrics", get(prometheus_metrics).with_state(handle));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
}

/// Prometheus text exposition of the story job metrics.
async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> String {
    handle.render()
}
