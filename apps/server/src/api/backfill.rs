use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::post,
    Json, Router,
};
use marketcache_core::backfill::BulkRunResult;
use serde::Deserialize;

use crate::{error::ApiResult, main_lib::AppState};

#[derive(Deserialize)]
struct BackfillQuery {
    batch_size: Option<usize>,
}

/// Run a fundamentals backfill for one exchange and return its counters.
async fn run_backfill(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
    Query(q): Query<BackfillQuery>,
) -> ApiResult<Json<BulkRunResult>> {
    let cancel = state.shutdown.child_token();
    let result = state.backfill.backfill(&code, q.batch_size, &cancel).await?;
    Ok(Json(result))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/backfill/{code}", post(run_backfill))
}
