use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use marketcache_core::errors::Error as CoreError;
use marketcache_core::ledger::{SymbolKey, UnavailabilityRecord};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

async fn list_unavailable(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<UnavailabilityRecord>>> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ApiError::BadRequest("exchange code is required".to_string()));
    }
    let records = state.ledger.list_for_exchange(code)?;
    Ok(Json(records))
}

/// Forget a ledger entry so the next backfill retries the symbol.
async fn clear_unavailable(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    let key = SymbolKey::parse(&symbol)?;
    if !state.ledger.clear(&key).await? {
        return Err(CoreError::NotFound(format!("{} is not in the ledger", key)).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    // Listing takes an exchange code, clearing a full symbol.
    Router::new().route(
        "/unavailable/{key}",
        get(list_unavailable).delete(clear_unavailable),
    )
}
