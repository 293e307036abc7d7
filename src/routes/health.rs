use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::time::Instant;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: StoreHealth,
}

/// Job store backend and, for Postgres, the round-trip of a trivial query.
#[derive(Serialize)]
pub struct StoreHealth {
    pub backend: &'static str,
    pub reachable: bool,
    pub latency_ms: Option<u64>,
}

/// GET /health: Liveness plus job store connectivity.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store = match &state.db {
        Some(pool) => {
            let start = Instant::now();
            let reachable = sqlx::query("SELECT 1").execute(pool).await.is_ok();
            StoreHealth {
                backend: "postgres",
                reachable,
                latency_ms: reachable.then(|| start.elapsed().as_millis() as u64),
            }
        }
        None => StoreHealth {
            backend: "memory",
            reachable: true,
            latency_ms: None,
        },
    };

    let (code, status) = if store.reachable {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            store,
        }),
    )
}
