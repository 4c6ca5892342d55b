use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, FromRequest, FromRequestParts, State},
    http::{HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use crate::ai::AiService;
use crate::config::AppConfig;
use crate::db::Database;
use crate::listing_manager::ListingManager;
use crate::pricing::PriceSuggestionService;
use crate::scheduler::ListingScheduler;
use crate::storage::ImageStore;

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use responses::{ApiError, ApiResult, ErrorBody};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub listings: ListingManager,
    pub ai: Arc<AiService>,
    pub pricing: PriceSuggestionService,
    pub images: ImageStore,
    pub scheduler: Arc<ListingScheduler>,
    pub config: Arc<AppConfig>,
    pub metrics: Option<PrometheusHandle>,
}

/// JSON body extractor whose rejections use the API error format.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Query string extractor whose rejections use the API error format.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Rejects values outside `min..=max` with a 400.
pub(crate) fn check_range(name: &str, value: i64, min: i64, max: i64) -> ApiResult<i64> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::bad_request(format!("{} must be between {} and {}", name, min, max)))
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api/listings", handlers::listings::routes())
        .nest("/api/generate", handlers::generate::routes())
        .nest("/api/analytics", handlers::analytics::routes())
        .nest("/api/scheduler", handlers::scheduler::routes());

    if state.metrics.is_some() {
        router = router.route(&config.metrics.endpoint, get(render_metrics));
    }

    if let Some(dir) = &config.server.static_dir {
        let index = Path::new(dir).join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    router
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::request_timeout))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum_middleware::from_fn(middleware::request_logging))
                .layer(CompressionLayer::new())
                .layer(cors_layer(&config.server.cors_origins)),
        )
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Listing Buddy API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health_check(State(state): State<AppState>) -> Response {
    match state.db.ping().await {
        Ok(()) => Json(json!({
            "status": "healthy",
            "database": "ok",
            "ai_providers": state.ai.provider_names(),
        }))
        .into_response(),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "database": "unreachable" })),
            )
                .into_response()
        }
    }
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
