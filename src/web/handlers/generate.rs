use axum::{
    extract::{multipart::{MultipartError, MultipartRejection}, DefaultBodyLimit, Multipart, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;
use validator::Validate;

use crate::ai::prompts;
use crate::ai::{DescriptionRequest, ExtractedProduct};
use crate::models::{ItemCondition, Language};
use crate::pricing::{build_search_query, PriceSuggestion, PriceSuggestionRequest};
use crate::utils::error::AppError;
use crate::web::{ApiError, ApiResult, AppJson, AppState};

const UPLOAD_BODY_LIMIT: usize = 64 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/upload-images", post(upload_images))
        .route("/description", post(generate_description))
        .route("/categories", get(categories))
        .route("/extract-from-url", post(extract_from_url))
        .route("/price-suggestion", post(price_suggestion))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub image_paths: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DescriptionResponse {
    pub category: String,
    pub description: String,
    #[serde(flatten)]
    pub price: PriceSuggestion,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExtractRequest {
    #[validate(url)]
    pub url: String,
    #[serde(default)]
    pub language: Language,
}

pub async fn upload_images(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let mut multipart = multipart?;
    let max_images = state.images.max_images();

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        if files.len() == max_images {
            return Err(ApiError::bad_request(format!("Maximum {} images allowed", max_images)));
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        files.push((filename, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("No files uploaded"));
    }

    let image_paths = state.images.save_images(files).await;
    if image_paths.is_empty() {
        return Err(ApiError::bad_request("Failed to save any images"));
    }

    Ok(Json(UploadResponse {
        count: image_paths.len(),
        image_paths,
    }))
}

/// Collects the text fields of a multipart form. Blank values count as absent.
async fn form_fields(mut multipart: Multipart) -> ApiResult<HashMap<String, String>> {
    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field.text().await?;
        let value = value.trim();
        if !value.is_empty() {
            fields.insert(name, value.to_string());
        }
    }
    Ok(fields)
}

fn parse_flag(value: Option<&str>, default: bool) -> ApiResult<bool> {
    match value.map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(ApiError::bad_request(format!("Invalid boolean value '{}'", other))),
    }
}

pub async fn generate_description(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<DescriptionResponse>> {
    let mut fields = form_fields(multipart?).await?;

    let raw_paths = fields.remove("image_paths").unwrap_or_default();
    let raw_paths: Vec<&str> = raw_paths.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    if raw_paths.is_empty() {
        return Err(ApiError::bad_request("At least one image path required"));
    }
    let image_paths = raw_paths
        .iter()
        .map(|raw| state.images.resolve(raw))
        .collect::<Result<Vec<PathBuf>, _>>()?;

    let language = fields
        .get("language")
        .map(|l| l.parse::<Language>())
        .transpose()?
        .unwrap_or_default();
    let condition = fields.get("condition").map(|c| c.parse::<ItemCondition>()).transpose()?;
    let include_price = parse_flag(fields.get("include_price_suggestion").map(String::as_str), true)?;

    let category = match fields.remove("category") {
        Some(category) => match prompts::find_category(&category) {
            Some(known) => known.id,
            None => {
                let supported: Vec<&str> = prompts::category_ids().collect();
                return Err(ApiError::bad_request(format!(
                    "Invalid category. Supported: {}",
                    supported.join(", ")
                )));
            }
        },
        None => {
            let suggested = state.ai.suggest_category(&image_paths, language).await?;
            info!("AI suggested category: {}", suggested);
            suggested
        }
    };

    let request = DescriptionRequest {
        category: category.to_string(),
        brand: fields.remove("brand"),
        condition: condition.map(|c| c.as_str().to_string()),
        size: fields.remove("size"),
        additional_details: fields.remove("additional_details"),
        language,
        product_url: fields.remove("product_url"),
    };
    let description = state.ai.generate_description(&request, &image_paths).await?;

    let price = if include_price {
        let search_query = build_search_query(
            request.brand.as_deref(),
            category,
            request.additional_details.as_deref(),
        );
        state
            .pricing
            .suggest(&PriceSuggestionRequest {
                search_query,
                category: Some(category.to_string()),
                brand: request.brand.clone(),
                condition,
            })
            .await
    } else {
        PriceSuggestion::empty()
    };

    Ok(Json(DescriptionResponse {
        category: category.to_string(),
        description,
        price,
    }))
}

pub async fn categories() -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: prompts::category_ids().map(str::to_string).collect(),
    })
}

pub async fn extract_from_url(
    State(state): State<AppState>,
    AppJson(request): AppJson<ExtractRequest>,
) -> ApiResult<Json<ExtractedProduct>> {
    request.validate().map_err(AppError::from)?;
    Ok(Json(state.ai.extract_from_url(&request.url, request.language).await?))
}

pub async fn price_suggestion(
    State(state): State<AppState>,
    AppJson(request): AppJson<PriceSuggestionRequest>,
) -> ApiResult<Json<PriceSuggestion>> {
    request.validate().map_err(AppError::from)?;
    Ok(Json(state.pricing.suggest(&request).await))
}
