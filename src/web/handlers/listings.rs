use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::listing_manager::AddByUrlRequest;
use crate::models::{Listing, ListingFilter, ListingStatus, MarkSold, NewListing, Platform, UpdateListing};
use crate::web::{check_range, ApiResult, AppJson, AppQuery, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_listings).post(create_listing))
        .route("/add-by-url", post(add_by_url))
        .route("/:id", get(get_listing).patch(update_listing).delete(delete_listing))
        .route("/:id/mark-sold", post(mark_sold))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub platform: Option<Platform>,
    pub status: Option<ListingStatus>,
}

fn default_limit() -> i64 {
    100
}

pub async fn add_by_url(
    State(state): State<AppState>,
    AppJson(request): AppJson<AddByUrlRequest>,
) -> ApiResult<(StatusCode, Json<Listing>)> {
    let listing = state.listings.add_by_url(request).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

pub async fn create_listing(
    State(state): State<AppState>,
    AppJson(new): AppJson<NewListing>,
) -> ApiResult<(StatusCode, Json<Listing>)> {
    let listing = state.listings.create(new).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

pub async fn list_listings(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> ApiResult<Json<Vec<Listing>>> {
    let skip = check_range("skip", params.skip, 0, i64::MAX)?;
    let limit = check_range("limit", params.limit, 1, 100)?;
    let filter = ListingFilter {
        platform: params.platform,
        status: params.status,
    };

    Ok(Json(state.listings.list(&filter, skip, limit).await?))
}

pub async fn get_listing(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Listing>> {
    Ok(Json(state.listings.get(id).await?))
}

pub async fn update_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(update): AppJson<UpdateListing>,
) -> ApiResult<Json<Listing>> {
    Ok(Json(state.listings.update(id, update).await?))
}

pub async fn delete_listing(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.listings.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_sold(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(sold): AppJson<MarkSold>,
) -> ApiResult<Json<Listing>> {
    Ok(Json(state.listings.mark_sold(id, sold).await?))
}
