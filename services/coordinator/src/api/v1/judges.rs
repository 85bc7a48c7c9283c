//! Judge roster endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::state::AppState;

/// Create judge routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_judges).post(create_judge))
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request to register a judge.
#[derive(Debug, Deserialize)]
pub struct CreateJudgeRequest {
    /// Display name; uniqueness is case-insensitive.
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct JudgeResponse {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ListJudgesResponse {
    /// Judge names, sorted case-insensitively.
    pub items: Vec<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List judges.
///
/// GET /v1/judges
async fn list_judges(State(state): State<AppState>) -> impl IntoResponse {
    let items = state
        .allocator()
        .list_judges()
        .await
        .iter()
        .map(ToString::to_string)
        .collect();
    Json(ListJudgesResponse { items })
}

/// Register a judge.
///
/// POST /v1/judges
async fn create_judge(
    State(state): State<AppState>,
    Json(req): Json<CreateJudgeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let judge = state.allocator().register_judge(&req.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(JudgeResponse {
            name: judge.to_string(),
        }),
    ))
}
