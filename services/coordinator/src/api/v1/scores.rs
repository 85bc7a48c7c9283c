//! Score history endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use jury_allocator::{Evaluation, ScoreRecord, TeamId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::ApiError;
use crate::state::AppState;

/// Create score routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_scores).post(create_score).delete(clear_scores))
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// A team given either as a number or as "Team N".
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TeamRef {
    Number(u32),
    Name(String),
}

impl TryFrom<TeamRef> for TeamId {
    type Error = ApiError;

    fn try_from(team: TeamRef) -> Result<Self, Self::Error> {
        match team {
            TeamRef::Number(n) => Ok(TeamId::new(n)),
            TeamRef::Name(name) => name.parse().map_err(|_| {
                ApiError::bad_request("invalid_team", format!("invalid team: {name}"))
            }),
        }
    }
}

/// Request to record one evaluation outside a batch.
#[derive(Debug, Deserialize)]
pub struct CreateScoreRequest {
    pub judge: String,
    pub team: TeamRef,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct ListScoresResponse {
    pub items: Vec<ScoreRecord>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List every stored score.
///
/// GET /v1/scores
async fn list_scores(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let items = state.allocator().list_scores().await?;
    Ok(Json(ListScoresResponse { items }))
}

/// Record one evaluation.
///
/// POST /v1/scores
async fn create_score(
    State(state): State<AppState>,
    Json(req): Json<CreateScoreRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let team = TeamId::try_from(req.team)?;
    let evaluation: Evaluation = state
        .allocator()
        .record_score(&req.judge, team, req.score)
        .await?;
    Ok((StatusCode::CREATED, Json(evaluation)))
}

/// Delete all scores and reset coverage.
///
/// DELETE /v1/scores
async fn clear_scores(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.allocator().clear_scores().await?;
    info!("Score history cleared via API");
    Ok(StatusCode::NO_CONTENT)
}
