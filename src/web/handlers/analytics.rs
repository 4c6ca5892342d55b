use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{AnalyticsSummary, BestSellers, InventoryValue, Period, SalesOverTime};
use crate::models::{CompetitorPrice, PriceHistory};
use crate::web::{check_range, ApiResult, AppQuery, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(summary))
        .route("/sales-over-time", get(sales_over_time))
        .route("/best-sellers", get(best_sellers))
        .route("/inventory-value", get(inventory_value))
        .route("/price-monitoring/:listing_id", get(price_monitoring))
        .route("/price-monitoring/:listing_id/history", get(price_history))
}

#[derive(Debug, Deserialize)]
pub struct SalesParams {
    #[serde(default)]
    pub period: Period,
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CompetitorPrices {
    pub listing_id: i64,
    pub competitor_prices: Vec<CompetitorPrice>,
}

#[derive(Debug, Serialize)]
pub struct PriceHistoryResponse {
    pub listing_id: i64,
    pub price_history: Vec<PriceHistory>,
}

pub async fn summary(State(state): State<AppState>) -> ApiResult<Json<AnalyticsSummary>> {
    Ok(Json(state.db.analytics_summary().await?))
}

pub async fn sales_over_time(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<SalesParams>,
) -> ApiResult<Json<SalesOverTime>> {
    let days = check_range("days", params.days, 1, 365)?;
    Ok(Json(state.db.sales_over_time(params.period, days).await?))
}

pub async fn best_sellers(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<LimitParams>,
) -> ApiResult<Json<BestSellers>> {
    let limit = check_range("limit", params.limit.unwrap_or(10), 1, 50)?;
    Ok(Json(state.db.best_sellers(limit).await?))
}

pub async fn inventory_value(State(state): State<AppState>) -> ApiResult<Json<InventoryValue>> {
    Ok(Json(state.db.inventory_value().await?))
}

pub async fn price_monitoring(
    State(state): State<AppState>,
    Path(listing_id): Path<i64>,
    AppQuery(params): AppQuery<LimitParams>,
) -> ApiResult<Json<CompetitorPrices>> {
    let limit = check_range("limit", params.limit.unwrap_or(50), 1, 100)?;
    Ok(Json(CompetitorPrices {
        listing_id,
        competitor_prices: state.db.competitor_prices(listing_id, limit).await?,
    }))
}

pub async fn price_history(
    State(state): State<AppState>,
    Path(listing_id): Path<i64>,
    AppQuery(params): AppQuery<LimitParams>,
) -> ApiResult<Json<PriceHistoryResponse>> {
    let limit = check_range("limit", params.limit.unwrap_or(100), 1, 500)?;
    Ok(Json(PriceHistoryResponse {
        listing_id,
        price_history: state.db.price_history(listing_id, limit).await?,
    }))
}
