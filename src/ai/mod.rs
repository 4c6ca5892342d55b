use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AiConfig;
use crate::models::Language;
use crate::utils::error::{AppError, Result};

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod page;
pub mod prompts;
pub mod url_guard;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use page::{PageContent, PageFetcher};

pub const MAX_IMAGES_PER_REQUEST: usize = 4;
pub const MAX_IMAGE_BYTES: u64 = 2 * 1024 * 1024;
const PAGE_CONTEXT_CHARS: usize = 3_000;
const PAGE_EXTRACT_CHARS: usize = 10_000;
const PAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// A base64-encoded image ready to embed in a provider request.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub media_type: &'static str,
    pub data: String,
}

impl EncodedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub images: Vec<EncodedImage>,
    pub max_tokens: u32,
}

/// A vision-capable text generation backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Passes 2xx responses through; anything else becomes a provider error
/// carrying the status and the start of the body.
pub(crate) async fn check_response(provider: &'static str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(AppError::provider(provider, format!("HTTP {}: {}", status, snippet)))
}

fn media_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Reads up to four images, rejecting missing or oversized files.
pub async fn load_images(paths: &[PathBuf]) -> Result<Vec<EncodedImage>> {
    let mut images = Vec::new();
    for path in paths.iter().take(MAX_IMAGES_PER_REQUEST) {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::not_found(format!("Image {}", path.display())));
            }
            Err(e) => return Err(e.into()),
        };
        if metadata.len() > MAX_IMAGE_BYTES {
            return Err(AppError::Validation(format!(
                "Image too large: {} bytes (max {} bytes)",
                metadata.len(),
                MAX_IMAGE_BYTES
            )));
        }

        let bytes = tokio::fs::read(path).await?;
        images.push(EncodedImage {
            media_type: media_type(path),
            data: STANDARD.encode(bytes),
        });
    }
    Ok(images)
}

#[derive(Debug, Clone, Default)]
pub struct DescriptionRequest {
    pub category: String,
    pub brand: Option<String>,
    pub condition: Option<String>,
    pub size: Option<String>,
    pub additional_details: Option<String>,
    pub language: Language,
    pub product_url: Option<String>,
}

/// Structured product data read from an arbitrary product page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedProduct {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub size: Option<String>,
    pub images: Vec<String>,
    pub specifications: Option<Value>,
}

impl ExtractedProduct {
    fn from_answer(answer: serde_json::Map<String, Value>, images: Vec<String>) -> Self {
        let text = |key: &str| {
            answer
                .get(key)
                .and_then(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
        };
        let price = answer.get("price").and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().replace(',', ".").parse().ok(),
            _ => None,
        });

        Self {
            title: text("title"),
            brand: text("brand"),
            description: text("description"),
            price,
            currency: text("currency").map(|c| c.to_uppercase()),
            category: text("category").map(|c| prompts::parse_category(&c).to_string()),
            condition: text("condition"),
            size: text("size"),
            images,
            specifications: answer.get("specifications").filter(|v| v.is_object()).cloned(),
        }
    }
}

/// Provider chain for description generation. Providers are tried in order
/// and the first non-empty answer wins.
pub struct AiService {
    providers: Vec<Arc<dyn AiProvider>>,
    pages: PageFetcher,
    max_tokens: u32,
}

impl AiService {
    pub fn new(providers: Vec<Arc<dyn AiProvider>>, pages: PageFetcher, max_tokens: u32) -> Self {
        Self {
            providers,
            pages,
            max_tokens,
        }
    }

    /// Registers OpenAI, Anthropic and Ollama, in that order, when configured.
    pub fn from_config(config: &AiConfig, user_agent: &str) -> Result<Self> {
        let mut providers: Vec<Arc<dyn AiProvider>> = Vec::new();

        if let Some(key) = &config.openai_api_key {
            providers.push(Arc::new(OpenAiProvider::new(config, key)?));
            info!("OpenAI provider configured ({})", config.openai_model);
        }
        if let Some(key) = &config.anthropic_api_key {
            providers.push(Arc::new(AnthropicProvider::new(config, key)?));
            info!("Anthropic provider configured ({})", config.anthropic_model);
        }
        if let Some(base_url) = &config.ollama_base_url {
            providers.push(Arc::new(OllamaProvider::new(config, base_url)?));
            info!("Ollama provider configured at {}", base_url);
        }
        if providers.is_empty() {
            warn!("No AI provider configured; description generation will be unavailable");
        }

        let pages = PageFetcher::new(user_agent, PAGE_FETCH_TIMEOUT)?;
        Ok(Self::new(providers, pages, config.max_tokens))
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn complete(&self, prompt: String, images: Vec<EncodedImage>, max_tokens: u32) -> Result<String> {
        let request = GenerationRequest {
            prompt,
            images,
            max_tokens,
        };

        for provider in &self.providers {
            let name = provider.name();
            match provider.generate(&request).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!(provider = name, "Generated text with {}", name);
                    return Ok(text.trim().to_string());
                }
                Ok(_) => warn!(provider = name, "{} returned an empty answer", name),
                Err(e) => warn!(provider = name, "{} generation failed: {}", name, e),
            }
            metrics::counter!("ai_provider_failures_total", "provider" => name).increment(1);
        }

        Err(AppError::NoProviderAvailable(
            "No AI provider available or all providers failed".to_string(),
        ))
    }

    pub async fn generate_description(&self, request: &DescriptionRequest, image_paths: &[PathBuf]) -> Result<String> {
        let category = prompts::find_category(&request.category)
            .ok_or_else(|| AppError::Validation(format!("Unsupported category: {}", request.category)))?;

        let page_context = match request.product_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => match self.pages.fetch(url).await {
                Ok(page) => Some(page.text(" ", PAGE_CONTEXT_CHARS)),
                Err(e) => {
                    warn!("Failed to fetch product page context from {}: {}", url, e);
                    None
                }
            },
            None => None,
        };

        let prompt = prompts::description_prompt(
            category,
            &prompts::PromptFields {
                brand: request.brand.as_deref(),
                condition: request.condition.as_deref(),
                size: request.size.as_deref(),
                details: request.additional_details.as_deref(),
                page_context: page_context.as_deref(),
            },
            request.language,
        );

        let images = load_images(image_paths).await?;
        self.complete(prompt, images, self.max_tokens).await
    }

    pub async fn suggest_category(&self, image_paths: &[PathBuf], language: Language) -> Result<&'static str> {
        let images = load_images(image_paths).await?;
        let answer = self
            .complete(prompts::category_prompt(language), images, self.max_tokens)
            .await?;
        Ok(prompts::parse_category(&answer))
    }

    pub async fn extract_from_url(&self, url: &str, language: Language) -> Result<ExtractedProduct> {
        let page = self.pages.fetch(url).await?;
        self.extract_from_page(&page, language).await
    }

    pub async fn extract_from_page(&self, page: &PageContent, language: Language) -> Result<ExtractedProduct> {
        let prompt = prompts::extraction_prompt(&page.text("\n", PAGE_EXTRACT_CHARS), language);
        let answer = self.complete(prompt, Vec::new(), self.max_tokens * 2).await?;
        Ok(ExtractedProduct::from_answer(
            prompts::parse_json_answer(&answer),
            page.images.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use std::io::Write;

    fn pages() -> PageFetcher {
        PageFetcher::new("test-agent", Duration::from_secs(1)).unwrap()
    }

    fn failing(name: &'static str) -> MockAiProvider {
        let mut provider = MockAiProvider::new();
        provider.expect_name().return_const(name);
        provider
            .expect_generate()
            .times(1)
            .returning(move |_| Err(AppError::provider(name, "HTTP 500")));
        provider
    }

    fn answering(name: &'static str, answer: &'static str) -> MockAiProvider {
        let mut provider = MockAiProvider::new();
        provider.expect_name().return_const(name);
        provider
            .expect_generate()
            .times(1)
            .returning(move |_| Ok(answer.to_string()));
        provider
    }

    #[tokio::test]
    async fn test_falls_through_to_third_provider() {
        let service = AiService::new(
            vec![
                Arc::new(failing("openai")),
                Arc::new(failing("anthropic")),
                Arc::new(answering("ollama", "  Piękna kurtka  ")),
            ],
            pages(),
            500,
        );

        let text = service.complete("prompt".to_string(), Vec::new(), 500).await.unwrap();
        assert_eq!(text, "Piękna kurtka");
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let mut unused = MockAiProvider::new();
        unused.expect_name().return_const("ollama");
        unused.expect_generate().never();

        let service = AiService::new(
            vec![Arc::new(answering("openai", "opis")), Arc::new(unused)],
            pages(),
            500,
        );
        assert_eq!(service.complete("p".to_string(), Vec::new(), 500).await.unwrap(), "opis");
    }

    #[tokio::test]
    async fn test_empty_answer_counts_as_failure() {
        let service = AiService::new(
            vec![Arc::new(answering("openai", "   ")), Arc::new(answering("anthropic", "ok"))],
            pages(),
            500,
        );
        assert_eq!(service.complete("p".to_string(), Vec::new(), 500).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_all_failing_is_unavailable() {
        let service = AiService::new(
            vec![Arc::new(failing("openai")), Arc::new(failing("anthropic"))],
            pages(),
            500,
        );
        let err = service.complete("p".to_string(), Vec::new(), 500).await.unwrap_err();
        assert!(matches!(err, AppError::NoProviderAvailable(_)));
    }

    #[tokio::test]
    async fn test_no_providers_is_unavailable() {
        let service = AiService::new(Vec::new(), pages(), 500);
        let err = service.complete("p".to_string(), Vec::new(), 500).await.unwrap_err();
        assert!(matches!(err, AppError::NoProviderAvailable(_)));
    }

    #[tokio::test]
    async fn test_generate_description_builds_prompt_and_sends_images() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("photo.png");
        std::fs::File::create(&image).unwrap().write_all(b"png-bytes").unwrap();

        let mut provider = MockAiProvider::new();
        provider.expect_name().return_const("openai");
        provider
            .expect_generate()
            .withf(|request| {
                request.prompt.contains("Marka: Zara")
                    && request.prompt.contains("Rozmiar: M")
                    && request.images.len() == 1
                    && request.images[0].media_type == "image/png"
                    && request.max_tokens == 500
            })
            .returning(|_| Ok("Opis".to_string()));

        let service = AiService::new(vec![Arc::new(provider)], pages(), 500);
        let request = DescriptionRequest {
            category: "womens_fashion".to_string(),
            brand: Some("Zara".to_string()),
            size: Some("M".to_string()),
            ..Default::default()
        };
        assert_eq!(service.generate_description(&request, &[image]).await.unwrap(), "Opis");
    }

    #[tokio::test]
    async fn test_generate_description_rejects_unknown_category() {
        let service = AiService::new(Vec::new(), pages(), 500);
        let request = DescriptionRequest {
            category: "spaceships".to_string(),
            ..Default::default()
        };
        let err = service.generate_description(&request, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_load_images_limits_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..6)
            .map(|i| {
                let path = dir.path().join(format!("{}.jpg", i));
                std::fs::write(&path, b"jpeg").unwrap();
                path
            })
            .collect();

        let images = load_images(&paths).await.unwrap();
        assert_eq!(images.len(), MAX_IMAGES_PER_REQUEST);
        assert_eq!(images[0].data_url(), "data:image/jpeg;base64,anBlZw==");

        let missing = load_images(&[dir.path().join("missing.jpg")]).await.unwrap_err();
        assert!(matches!(missing, AppError::NotFound { .. }));

        let big = dir.path().join("big.jpg");
        std::fs::write(&big, vec![0u8; (MAX_IMAGE_BYTES + 1) as usize]).unwrap();
        assert!(matches!(load_images(&[big]).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_suggest_category_validates_answer() {
        let mut seq = Sequence::new();
        let mut provider = MockAiProvider::new();
        provider.expect_name().return_const("openai");
        provider
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("Electronics.".to_string()));
        provider
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("a spaceship".to_string()));

        let service = AiService::new(vec![Arc::new(provider)], pages(), 500);
        assert_eq!(service.suggest_category(&[], Language::En).await.unwrap(), "electronics");
        assert_eq!(service.suggest_category(&[], Language::En).await.unwrap(), "other");
    }

    #[tokio::test]
    async fn test_extract_from_page() {
        let provider = answering(
            "anthropic",
            "```json\n{\"title\": \"Rower Kross\", \"price\": \"1 200\", \"currency\": \"pln\", \"category\": \"sports_hobby\", \"specifications\": {\"rama\": \"M\"}}\n```",
        );
        let service = AiService::new(vec![Arc::new(provider)], pages(), 500);
        let page = PageContent {
            chunks: vec!["Rower Kross Hexagon".to_string()],
            images: vec!["https://cdn.shop.pl/rower.jpg".to_string()],
        };

        let product = service.extract_from_page(&page, Language::Pl).await.unwrap();
        assert_eq!(product.title.as_deref(), Some("Rower Kross"));
        assert_eq!(product.currency.as_deref(), Some("PLN"));
        assert_eq!(product.category.as_deref(), Some("sports_hobby"));
        assert_eq!(product.images, page.images);
        assert!(product.specifications.is_some());
        // "1 200" is not a plain number
        assert_eq!(product.price, None);
    }

    #[tokio::test]
    async fn test_extract_from_page_malformed_answer() {
        let service = AiService::new(vec![Arc::new(answering("openai", "no json here"))], pages(), 500);
        let product = service
            .extract_from_page(&PageContent::default(), Language::En)
            .await
            .unwrap();
        assert_eq!(product, ExtractedProduct::default());
    }
}
