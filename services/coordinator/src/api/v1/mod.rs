//! API v1 routes.

mod batches;
mod judges;
mod scores;
mod teams;

use axum::Router;

use crate::state::AppState;

/// Create API v1 routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/judges", judges::routes())
        // A judge's active batch: /v1/judges/{judge}/batch
        .nest("/judges/{judge}/batch", batches::routes())
        .nest("/scores", scores::routes())
        .nest("/teams", teams::routes())
}
