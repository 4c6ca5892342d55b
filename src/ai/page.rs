use reqwest::redirect::Policy;
use scraper::{Html, Node, Selector};
use std::time::Duration;
use tracing::debug;

use super::url_guard::{check_public_url, parse_public_url};
use crate::utils::error::{AppError, Result};

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "nav", "footer", "header"];
const MAX_PAGE_IMAGES: usize = 10;
const MAX_REDIRECTS: usize = 5;

/// Readable text and image URLs of a product page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub chunks: Vec<String>,
    pub images: Vec<String>,
}

impl PageContent {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);

        let chunks = document
            .root_element()
            .descendants()
            .filter_map(|node| {
                let Node::Text(text) = node.value() else {
                    return None;
                };
                let skipped = node.ancestors().any(|ancestor| match ancestor.value() {
                    Node::Element(element) => SKIPPED_TAGS.contains(&element.name()),
                    _ => false,
                });
                let trimmed = text.trim();
                (!skipped && !trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .collect();

        let images = match Selector::parse("img[src]") {
            Ok(selector) => document
                .select(&selector)
                .take(MAX_PAGE_IMAGES)
                .filter_map(|img| img.value().attr("src"))
                .filter(|src| src.starts_with("http"))
                .map(str::to_string)
                .collect(),
            Err(_) => Vec::new(),
        };

        Self { chunks, images }
    }

    /// Text joined with `separator`, cut to at most `max_chars` characters.
    pub fn text(&self, separator: &str, max_chars: usize) -> String {
        self.chunks.join(separator).chars().take(max_chars).collect()
    }
}

/// Fetches user-supplied product pages. Every hop, redirects included, must
/// resolve to a public host.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let policy = Policy::custom(|attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if check_public_url(attempt.url()).is_err() {
                attempt.stop()
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .redirect(policy)
            .build()?;
        Ok(Self { client })
    }

    /// An unreachable page or a non-2xx answer is the caller's bad input,
    /// reported as a validation error.
    pub async fn fetch(&self, raw_url: &str) -> Result<PageContent> {
        let url = parse_public_url(raw_url)?;
        debug!("Fetching product page {}", url);

        let failed = |reason: String| AppError::Validation(format!("Failed to fetch URL {}: {}", url, reason));

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)));
        }

        let html = response.text().await.map_err(|e| failed(e.to_string()))?;
        Ok(PageContent::parse(&html))
    }
}
