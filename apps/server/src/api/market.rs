use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use marketcache_core::cache::{CachedResponse, Page, PageParams, SortOrder};
use marketcache_core::constants::DEFAULT_PAGE_SIZE;
use marketcache_market_data::{Exchange, Fundamentals, HistoricalPrice, Quote, Symbol};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Deserialize, Default)]
struct RefreshQuery {
    #[serde(default)]
    force_refresh: bool,
}

#[derive(Deserialize, Default)]
struct ListQuery {
    page: Option<usize>,
    page_size: Option<usize>,
    filter: Option<String>,
    sort: Option<SortOrder>,
    #[serde(default)]
    force_refresh: bool,
}

impl ListQuery {
    fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page.unwrap_or(1),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            filter: self.filter.clone(),
            sort: self.sort.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct HistoryQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    #[serde(default)]
    force_refresh: bool,
}

async fn get_exchanges(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<CachedResponse<Page<Exchange>>>> {
    let response = state
        .cache
        .get_exchanges(q.force_refresh, &q.page_params())
        .await?;
    Ok(Json(response))
}

async fn get_symbols(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<CachedResponse<Page<Symbol>>>> {
    let response = state
        .cache
        .get_symbols(&code, q.force_refresh, &q.page_params())
        .await?;
    Ok(Json(response))
}

async fn get_quote(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
    Query(q): Query<RefreshQuery>,
) -> ApiResult<Json<CachedResponse<Quote>>> {
    let response = state.cache.get_quote(&symbol, q.force_refresh).await?;
    Ok(Json(response))
}

async fn get_history(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult<Json<CachedResponse<Vec<HistoricalPrice>>>> {
    let (Some(from), Some(to)) = (q.from, q.to) else {
        return Err(ApiError::BadRequest(
            "from and to are required (YYYY-MM-DD)".to_string(),
        ));
    };
    let response = state
        .cache
        .get_historical_prices(&symbol, from, to, q.force_refresh)
        .await?;
    Ok(Json(response))
}

async fn get_fundamentals(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
    Query(q): Query<RefreshQuery>,
) -> ApiResult<Json<CachedResponse<Fundamentals>>> {
    let response = state
        .cache
        .get_fundamentals(&symbol, q.force_refresh)
        .await?;
    Ok(Json(response))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/exchanges", get(get_exchanges))
        .route("/exchanges/{code}/symbols", get(get_symbols))
        .route("/quotes/{symbol}", get(get_quote))
        .route("/history/{symbol}", get(get_history))
        .route("/fundamentals/{symbol}", get(get_fundamentals))
}
