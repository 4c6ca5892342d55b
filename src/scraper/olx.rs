use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::warn;
use url::Url;
use url::form_urlencoded::byte_serialize;

use super::detail::{DetailParser, selector};
use super::{HttpFetcher, MarketplaceScraper, PriceParser, ScrapedListing, SimilarItem};
use crate::models::Platform;
use crate::utils::error::Result;

pub struct OlxScraper {
    http: Arc<HttpFetcher>,
    base_url: Url,
    prices: PriceParser,
    detail: DetailParser,
    card: Selector,
    title: Selector,
    link: Selector,
    price: Selector,
}

impl OlxScraper {
    pub fn new(http: Arc<HttpFetcher>, base_url: &str, prices: PriceParser) -> Result<Self> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            detail: DetailParser::new(prices.clone())?,
            prices,
            card: selector(r#"div[data-cy="l-card"]"#)?,
            title: selector("h6, h4")?,
            link: selector("a[href]")?,
            price: selector(r#"p[data-testid="ad-price"]"#)?,
        })
    }

    fn search_url(&self, query: &str) -> Result<Url> {
        let encoded: String = byte_serialize(query.trim().as_bytes()).collect();
        Ok(self.base_url.join(&format!("/oferty/q-{}/", encoded))?)
    }

    fn parse_card(&self, card: ElementRef<'_>) -> Option<SimilarItem> {
        let title = card.select(&self.title).next()?.text().collect::<String>();
        let href = card.select(&self.link).next()?.value().attr("href")?;
        let price_text = card.select(&self.price).next()?.text().collect::<String>();

        let price = self.prices.parse_positive(&price_text)?;
        let url = match self.base_url.join(href) {
            Ok(url) => url,
            Err(e) => {
                warn!("Failed to parse OLX listing link '{}': {}", href, e);
                return None;
            }
        };

        Some(SimilarItem {
            platform: Platform::Olx,
            title: title.trim().to_string(),
            price,
            url: url.to_string(),
            similarity_score: 0.0,
        })
    }

    fn parse_search(&self, html: &str, max_results: usize) -> Vec<SimilarItem> {
        let document = Html::parse_document(html);
        document
            .select(&self.card)
            .take(max_results)
            .filter_map(|card| self.parse_card(card))
            .collect()
    }
}

#[async_trait]
impl MarketplaceScraper for OlxScraper {
    fn platform(&self) -> Platform {
        Platform::Olx
    }

    async fn search<'a>(&self, query: &str, _brand: Option<&'a str>, max_results: usize) -> Result<Vec<SimilarItem>> {
        let html = self.http.get_html(self.search_url(query)?).await?;
        Ok(self.parse_search(&html, max_results))
    }

    async fn fetch_listing(&self, url: &str) -> Result<ScrapedListing> {
        let html = self.http.get_html(Url::parse(url)?).await?;
        Ok(self.detail.parse(&html))
    }
}
