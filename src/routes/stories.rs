use axum::extract::{Path, State};
use axum::http::header::RETRY_AFTER;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::request::{
    MyStoriesResponse, StoryStatusResponse, SubmitStoryRequest, SubmitStoryResponse,
};
use crate::routes::auth::MaybeOwner;
use crate::services::jobs::StoryServiceError;

/// Stories returned by `GET /my-stories`.
const MY_STORIES_LIMIT: i64 = 50;

/// POST /generateStory: Start a story job and return its id immediately.
pub async fn generate_story(
    State(state): State<AppState>,
    MaybeOwner(owner): MaybeOwner,
    Json(request): Json<SubmitStoryRequest>,
) -> Result<Json<SubmitStoryResponse>, StoryServiceError> {
    let submission = state.stories.submit(request, owner).await?;
    Ok(Json(submission.response))
}

/// GET /story/{id}/status: Poll a story job.
pub async fn story_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoryStatusResponse>, StoryServiceError> {
    Ok(Json(state.stories.get_status(id).await?))
}

/// PUT /story/{id}/viewed
pub async fn mark_viewed(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StoryServiceError> {
    state.stories.mark_viewed(id).await?;
    Ok(Json(json!({ "message": "Story marked as viewed" })))
}

/// GET /my-stories: The caller's recent stories. Requires a bearer token.
pub async fn my_stories(
    State(state): State<AppState>,
    MaybeOwner(owner): MaybeOwner,
) -> Result<Json<MyStoriesResponse>, Response> {
    let Some(owner) = owner else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Authentication required" })),
        )
            .into_response());
    };

    state
        .stories
        .list_for_owner(&owner, MY_STORIES_LIMIT)
        .await
        .map(Json)
        .map_err(IntoResponse::into_response)
}

impl IntoResponse for StoryServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoryServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoryServiceError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            StoryServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            StoryServiceError::InvalidTransition { .. } => StatusCode::CONFLICT,
            StoryServiceError::Persistence(e) => {
                error!(error = %e, "Story store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let detail = match &self {
            StoryServiceError::Persistence(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let body = Json(json!({ "detail": detail }));

        if matches!(self, StoryServiceError::RateLimited) {
            return (status, [(RETRY_AFTER, "10")], body).into_response();
        }
        (status, body).into_response()
    }
}
