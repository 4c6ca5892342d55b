use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::ScraperConfig;
use crate::models::Platform;
use crate::pricing::similarity::similarity_scores;
use crate::utils::error::{AppError, Result};

pub mod detail;
pub mod http;
pub mod olx;
pub mod price;
pub mod vinted;

pub use http::HttpFetcher;
pub use olx::OlxScraper;
pub use price::PriceParser;
pub use vinted::VintedScraper;

/// A marketplace search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarItem {
    pub platform: Platform,
    pub title: String,
    pub price: f64,
    pub url: String,
    #[serde(default)]
    pub similarity_score: f64,
}

/// Normalized fields read from a single listing page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScrapedListing {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub condition: Option<String>,
    pub size: Option<String>,
    pub images: Vec<String>,
    pub views: Option<i64>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketplaceScraper: Send + Sync {
    fn platform(&self) -> Platform;

    async fn search<'a>(&self, query: &str, brand: Option<&'a str>, max_results: usize) -> Result<Vec<SimilarItem>>;

    async fn fetch_listing(&self, url: &str) -> Result<ScrapedListing>;
}

/// All marketplace adapters behind one handle.
#[derive(Clone)]
pub struct Marketplaces {
    scrapers: Vec<Arc<dyn MarketplaceScraper>>,
}

impl Marketplaces {
    pub fn new(scrapers: Vec<Arc<dyn MarketplaceScraper>>) -> Self {
        Self { scrapers }
    }

    /// OLX and Vinted sharing one rate-limited HTTP client.
    pub fn from_config(config: &ScraperConfig) -> Result<Self> {
        let http = Arc::new(HttpFetcher::new(config)?);
        let prices = PriceParser::new()?;
        Ok(Self::new(vec![
            Arc::new(OlxScraper::new(http.clone(), &config.olx_base_url, prices.clone())?),
            Arc::new(VintedScraper::new(http, &config.vinted_base_url, prices)?),
        ]))
    }

    fn scraper(&self, platform: Platform) -> Result<&Arc<dyn MarketplaceScraper>> {
        self.scrapers
            .iter()
            .find(|s| s.platform() == platform)
            .ok_or_else(|| AppError::Scraping(format!("No scraper registered for {}", platform)))
    }

    pub async fn fetch_listing(&self, platform: Platform, url: &str) -> Result<ScrapedListing> {
        let result = self.scraper(platform)?.fetch_listing(url).await;
        if result.is_err() {
            metrics::counter!("scrape_failures_total", "platform" => platform.as_str()).increment(1);
        }
        result
    }

    /// Searches every marketplace concurrently and ranks the hits by title
    /// similarity to the query. A failing marketplace contributes nothing.
    pub async fn find_similar(&self, query: &str, brand: Option<&str>, max_results: usize) -> Vec<SimilarItem> {
        let per_platform = (max_results / self.scrapers.len().max(1)).max(1);

        let searches = self
            .scrapers
            .iter()
            .map(|scraper| async move { (scraper.platform(), scraper.search(query, brand, per_platform).await) });

        let mut items = Vec::new();
        for (platform, result) in join_all(searches).await {
            match result {
                Ok(found) => {
                    info!("Found {} items on {}", found.len(), platform);
                    items.extend(found);
                }
                Err(e) => {
                    error!("{} search failed: {}", platform, e);
                    metrics::counter!("scrape_failures_total", "platform" => platform.as_str()).increment(1);
                }
            }
        }

        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        let scores = similarity_scores(query, &titles);
        for (item, score) in items.iter_mut().zip(scores) {
            item.similarity_score = score;
        }

        items.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        items.truncate(max_results);
        items
    }
}
