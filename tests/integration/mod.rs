// Shared harness: an in-memory database, a temporary upload directory and
// fake marketplaces/AI providers behind the real router.

pub mod analytics_tests;
pub mod generate_tests;
pub mod listings_tests;
pub mod scheduler_tests;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use listing_buddy::{
    ai::{AiProvider, AiService, GenerationRequest, PageFetcher},
    config::{SchedulerConfig, StorageConfig},
    jobs::JobRunner,
    listing_manager::ListingManager,
    models::Platform,
    pricing::PriceSuggestionService,
    scheduler::ListingScheduler,
    scraper::{Marketplaces, MarketplaceScraper, ScrapedListing, SimilarItem},
    storage::ImageStore,
    web::{create_router, AppState},
    AppConfig, AppError, Database,
};

/// Marketplace double: fixed search hits, and listing pages for URLs
/// that do not contain "missing".
pub struct FakeScraper {
    pub platform: Platform,
    pub hits: Vec<SimilarItem>,
}

#[async_trait]
impl MarketplaceScraper for FakeScraper {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn search<'a>(&self, _query: &str, _brand: Option<&'a str>, max_results: usize) -> listing_buddy::Result<Vec<SimilarItem>> {
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }

    async fn fetch_listing(&self, url: &str) -> listing_buddy::Result<ScrapedListing> {
        if url.contains("missing") {
            return Err(AppError::Scraping("HTTP 404".to_string()));
        }
        Ok(ScrapedListing {
            title: Some("Buty Nike Air Max 42".to_string()),
            price: Some(180.0),
            brand: Some("Nike".to_string()),
            views: Some(12),
            ..Default::default()
        })
    }
}

/// AI provider double that always answers the same text, or always fails.
pub struct FakeProvider {
    pub answer: Option<String>,
}

#[async_trait]
impl AiProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn generate(&self, _request: &GenerationRequest) -> listing_buddy::Result<String> {
        self.answer
            .clone()
            .ok_or_else(|| AppError::provider("fake", "service down"))
    }
}

pub fn hit(platform: Platform, title: &str, price: f64) -> SimilarItem {
    SimilarItem {
        platform,
        title: title.to_string(),
        price,
        url: format!("https://example.com/{}/{}", platform, price),
        similarity_score: 0.0,
    }
}

pub fn default_hits() -> Vec<SimilarItem> {
    vec![
        hit(Platform::Vinted, "Buty Nike Air Max 42", 150.0),
        hit(Platform::Vinted, "Nike Air Max buty sportowe", 200.0),
        hit(Platform::Vinted, "Szafka nocna dębowa", 90.0),
    ]
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub upload_dir: TempDir,
}

pub async fn create_test_app(provider_answer: Option<&str>, hits: Vec<SimilarItem>) -> anyhow::Result<TestApp> {
    let upload_dir = tempfile::tempdir()?;
    let mut config = AppConfig::default();
    config.scheduler = SchedulerConfig {
        enabled: false,
        ..Default::default()
    };
    config.storage = StorageConfig {
        upload_dir: upload_dir.path().join("uploads").to_string_lossy().into_owned(),
        ..Default::default()
    };

    let db = Database::in_memory().await?;
    let marketplaces = Marketplaces::new(vec![
        Arc::new(FakeScraper { platform: Platform::Olx, hits: Vec::new() }),
        Arc::new(FakeScraper { platform: Platform::Vinted, hits }),
    ]);
    let listings = ListingManager::new(db.clone(), marketplaces.clone());

    let providers: Vec<Arc<dyn AiProvider>> = vec![Arc::new(FakeProvider {
        answer: provider_answer.map(str::to_string),
    })];
    let ai = AiService::new(providers, PageFetcher::new("listing-buddy-tests", Duration::from_secs(5))?, 500);

    let runner = JobRunner::new(listings.clone(), marketplaces.clone(), config.scheduler.clone(), 20);
    let scheduler = ListingScheduler::new(runner, config.scheduler.clone()).await?;

    let state = AppState {
        db,
        listings,
        ai: Arc::new(ai),
        pricing: PriceSuggestionService::new(marketplaces, 20),
        images: ImageStore::new(&config.storage)?,
        scheduler: Arc::new(scheduler),
        config: Arc::new(config),
        metrics: None,
    };

    Ok(TestApp {
        router: create_router(state.clone()),
        state,
        upload_dir,
    })
}

/// Sends one request through the router.
pub async fn make_request(app: &Router, method: Method, uri: &str, body: Option<Value>) -> anyhow::Result<Response> {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }

    let request = request.body(match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    })?;

    Ok(app.clone().oneshot(request).await?)
}

const BOUNDARY: &str = "listing-buddy-test-boundary";

/// One part of a multipart form: a text field, or a file when `filename` is set.
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: Vec<u8>,
}

impl<'a> Part<'a> {
    pub fn text(name: &'a str, value: &str) -> Self {
        Self { name, filename: None, data: value.as_bytes().to_vec() }
    }

    pub fn file(name: &'a str, filename: &'a str, data: Vec<u8>) -> Self {
        Self { name, filename: Some(filename), data }
    }
}

pub async fn make_multipart_request(app: &Router, uri: &str, parts: Vec<Part<'_>>) -> anyhow::Result<Response> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
            ),
        }
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))?;

    Ok(app.clone().oneshot(request).await?)
}

pub async fn body_json(response: Response) -> anyhow::Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .expect("encode png");
    bytes
}
