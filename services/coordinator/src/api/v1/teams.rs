//! Team universe, coverage and standings endpoints.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use jury_allocator::{TeamCoverage, TeamRange, TeamStanding};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::state::AppState;

/// Create team routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/range", get(get_range).put(put_range))
        .route("/coverage", get(get_coverage))
        .route("/standings", get(get_standings))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RangeRequest {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Serialize)]
pub struct RangeResponse {
    pub start: u32,
    pub end: u32,
    pub teams: usize,
}

impl From<TeamRange> for RangeResponse {
    fn from(range: TeamRange) -> Self {
        Self {
            start: range.start(),
            end: range.end(),
            teams: range.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CoverageResponse {
    pub items: Vec<TeamCoverage>,
    /// Max minus min coverage across the universe.
    pub spread: usize,
}

#[derive(Debug, Serialize)]
pub struct StandingsResponse {
    pub items: Vec<TeamStanding>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /v1/teams/range
async fn get_range(State(state): State<AppState>) -> impl IntoResponse {
    Json(RangeResponse::from(state.allocator().team_range().await))
}

/// Replace the team universe. Discards all batches and coverage.
///
/// PUT /v1/teams/range
async fn put_range(
    State(state): State<AppState>,
    Json(req): Json<RangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let range = state
        .allocator()
        .reconfigure_range(req.start, req.end)
        .await?;
    Ok(Json(RangeResponse::from(range)))
}

/// GET /v1/teams/coverage
async fn get_coverage(State(state): State<AppState>) -> impl IntoResponse {
    let allocator = state.allocator();
    let items = allocator.coverage().await;
    let spread = allocator.coverage_spread().await;
    Json(CoverageResponse { items, spread })
}

/// GET /v1/teams/standings
async fn get_standings(State(state): State<AppState>) -> impl IntoResponse {
    Json(StandingsResponse {
        items: state.allocator().standings().await,
    })
}
