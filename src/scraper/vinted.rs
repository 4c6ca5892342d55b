use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use url::Url;

use super::detail::{DetailParser, selector};
use super::{HttpFetcher, MarketplaceScraper, PriceParser, ScrapedListing, SimilarItem};
use crate::models::Platform;
use crate::utils::error::Result;

pub struct VintedScraper {
    http: Arc<HttpFetcher>,
    base_url: Url,
    prices: PriceParser,
    detail: DetailParser,
    item: Selector,
    title: Selector,
    link: Selector,
    price: Selector,
}

impl VintedScraper {
    pub fn new(http: Arc<HttpFetcher>, base_url: &str, prices: PriceParser) -> Result<Self> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            detail: DetailParser::new(prices.clone())?,
            prices,
            item: selector(r#"div[class*="feed-grid__item"]"#)?,
            title: selector(r#"[class*="ItemBox_title"], [data-testid$="--description-title"]"#)?,
            link: selector("a[href]")?,
            price: selector(r#"[class*="ItemBox_price"], [data-testid$="--price-text"]"#)?,
        })
    }

    fn search_url(&self, query: &str, brand: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.join("/catalog")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("search_text", query.trim());
            if let Some(brand) = brand.map(str::trim).filter(|b| !b.is_empty()) {
                pairs.append_pair("brand_ids[]", brand);
            }
        }
        Ok(url)
    }

    fn parse_item(&self, item: ElementRef<'_>) -> Option<SimilarItem> {
        let href = item.select(&self.link).next()?.value().attr("href")?;
        let title = item.select(&self.title).next()?.text().collect::<String>();
        let price_text = item.select(&self.price).next()?.text().collect::<String>();
        let price = self.prices.parse_positive(&price_text)?;
        let url = self.base_url.join(href).ok()?;

        Some(SimilarItem {
            platform: Platform::Vinted,
            title: title.trim().to_string(),
            price,
            url: url.to_string(),
            similarity_score: 0.0,
        })
    }

    fn parse_search(&self, html: &str, max_results: usize) -> Vec<SimilarItem> {
        let document = Html::parse_document(html);
        document
            .select(&self.item)
            .take(max_results)
            .filter_map(|item| self.parse_item(item))
            .collect()
    }
}

#[async_trait]
impl MarketplaceScraper for VintedScraper {
    fn platform(&self) -> Platform {
        Platform::Vinted
    }

    async fn search<'a>(&self, query: &str, brand: Option<&'a str>, max_results: usize) -> Result<Vec<SimilarItem>> {
        let html = self.http.get_html(self.search_url(query, brand)?).await?;
        Ok(self.parse_search(&html, max_results))
    }

    async fn fetch_listing(&self, url: &str) -> Result<ScrapedListing> {
        let html = self.http.get_html(Url::parse(url)?).await?;
        Ok(self.detail.parse(&html))
    }
}
