use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::app_state::AppState;
use crate::models::request::{FunFactsRequest, FunFactsResponse};
use crate::services::fun_facts::FunFactsError;

/// POST /generateFunFacts: Ten question and answer facts, generated inline.
pub async fn generate_fun_facts(
    State(state): State<AppState>,
    Json(request): Json<FunFactsRequest>,
) -> Result<Json<FunFactsResponse>, FunFactsError> {
    let facts = state.fun_facts.generate(&request).await?;
    Ok(Json(FunFactsResponse { facts }))
}

impl IntoResponse for FunFactsError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            FunFactsError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            FunFactsError::Upstream(e) => {
                error!(error = %e, "Fun facts upstream failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "Fun facts generation failed".to_string(),
                )
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
