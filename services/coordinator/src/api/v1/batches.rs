//! Batch lifecycle endpoints for a single judge.
//!
//! Nested under /v1/judges/{judge}/batch.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use jury_allocator::{ActiveBatch, Evaluation, JudgeState, SubmitReceipt, TeamId};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::state::AppState;

/// Create batch routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_batch).delete(abandon_batch))
        .route("/scores/{index}", put(set_score))
        .route("/submit", post(submit_batch))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub judge: String,
    pub state: JudgeState,
    /// Assigned teams, ascending. Empty when nothing is left to assign.
    pub teams: Vec<TeamId>,
    /// Pending score per team slot.
    pub scores: Vec<Option<f64>>,
}

impl From<ActiveBatch> for BatchResponse {
    fn from(batch: ActiveBatch) -> Self {
        Self {
            judge: batch.judge().to_string(),
            state: batch.state(),
            teams: batch.teams().to_vec(),
            scores: batch.scores().to_vec(),
        }
    }
}

/// Request to set or clear one pending score.
#[derive(Debug, Deserialize)]
pub struct SetScoreRequest {
    /// `null` clears the slot.
    pub score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SetScoreResponse {
    /// False when the value was outside the score range and ignored.
    pub accepted: bool,
    pub batch: BatchResponse,
}

#[derive(Debug, Serialize)]
pub struct AbandonResponse {
    pub abandoned: bool,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub judge: String,
    pub committed: Vec<Evaluation>,
    pub ledger_updated: bool,
}

impl From<SubmitReceipt> for SubmitResponse {
    fn from(receipt: SubmitReceipt) -> Self {
        Self {
            judge: receipt.judge.to_string(),
            committed: receipt.committed,
            ledger_updated: receipt.ledger_updated,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Get the judge's active batch, assigning one if needed.
///
/// GET /v1/judges/{judge}/batch
async fn get_batch(
    State(state): State<AppState>,
    Path(judge): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = state
        .allocator()
        .select_judge(&judge)
        .await
        .map_err(|e| ApiError::from(e).with_instance(batch_path(&judge)))?;
    Ok(Json(BatchResponse::from(batch)))
}

/// Drop the judge's batch without recording scores.
///
/// DELETE /v1/judges/{judge}/batch
async fn abandon_batch(
    State(state): State<AppState>,
    Path(judge): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let abandoned = state
        .allocator()
        .abandon(&judge)
        .await
        .map_err(|e| ApiError::from(e).with_instance(batch_path(&judge)))?;
    Ok(Json(AbandonResponse { abandoned }))
}

/// Set or clear the pending score for one slot.
///
/// PUT /v1/judges/{judge}/batch/scores/{index}
async fn set_score(
    State(state): State<AppState>,
    Path((judge, index)): Path<(String, usize)>,
    Json(req): Json<SetScoreRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let allocator = state.allocator();
    let accepted = allocator
        .record_score_input(&judge, index, req.score)
        .await
        .map_err(|e| ApiError::from(e).with_instance(batch_path(&judge)))?;

    let batch = allocator.active_batch(&judge).await?.ok_or_else(|| {
        ApiError::not_found("no_active_batch", format!("judge {judge} has no active batch"))
    })?;

    Ok(Json(SetScoreResponse {
        accepted,
        batch: batch.into(),
    }))
}

/// Store every pending score of the batch.
///
/// POST /v1/judges/{judge}/batch/submit
async fn submit_batch(
    State(state): State<AppState>,
    Path(judge): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .allocator()
        .submit(&judge)
        .await
        .map_err(|e| ApiError::from(e).with_instance(batch_path(&judge)))?;
    Ok(Json(SubmitResponse::from(receipt)))
}

fn batch_path(judge: &str) -> String {
    format!("/v1/judges/{judge}/batch")
}
