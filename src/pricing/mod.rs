use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::models::ItemCondition;
use crate::scraper::{Marketplaces, SimilarItem};

pub mod similarity;

/// Candidates scoring below this are not comparable items.
pub const SIMILARITY_THRESHOLD: f64 = 0.2;
const SHOWN_ITEMS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PriceSuggestionRequest {
    #[validate(length(min = 1, max = 200))]
    pub search_query: String,
    /// Informational. Marketplace searches are keyword-only, so the category
    /// only matters once it is part of `search_query`.
    pub category: Option<String>,
    pub brand: Option<String>,
    pub condition: Option<ItemCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceSuggestion {
    pub suggested_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub median_price: Option<f64>,
    pub sample_size: usize,
    pub similar_items: Vec<SimilarItem>,
}

impl PriceSuggestion {
    pub fn empty() -> Self {
        Self {
            suggested_price: None,
            min_price: None,
            max_price: None,
            median_price: None,
            sample_size: 0,
            similar_items: Vec::new(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Statistics over candidates already scored for similarity.
pub fn summarize(mut candidates: Vec<SimilarItem>, condition: ItemCondition) -> PriceSuggestion {
    candidates.retain(|item| item.similarity_score >= SIMILARITY_THRESHOLD && item.price > 0.0);
    if candidates.is_empty() {
        return PriceSuggestion::empty();
    }

    let mut prices: Vec<f64> = candidates.iter().map(|item| item.price).collect();
    prices.sort_by(f64::total_cmp);

    let n = prices.len();
    let index = (condition.price_percentile() * (n - 1) as f64).floor() as usize;

    candidates.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    let similar_items = candidates
        .into_iter()
        .take(SHOWN_ITEMS)
        .map(|mut item| {
            item.similarity_score = round2(item.similarity_score);
            item
        })
        .collect();

    PriceSuggestion {
        suggested_price: Some(round2(prices[index.min(n - 1)])),
        min_price: Some(round2(prices[0])),
        max_price: Some(round2(prices[n - 1])),
        median_price: Some(round2(median(&prices))),
        sample_size: n,
        similar_items,
    }
}

/// Query used when a description request also asks for a price:
/// brand, category words and the start of the free-text details.
pub fn build_search_query(brand: Option<&str>, category: &str, details: Option<&str>) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(brand) = brand.map(str::trim).filter(|b| !b.is_empty()) {
        parts.push(brand.to_string());
    }
    parts.push(category.replace('_', " "));
    if let Some(details) = details.map(str::trim).filter(|d| !d.is_empty()) {
        parts.push(truncate_words(details, 100));
    }
    parts.join(" ")
}

fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    match cut.rfind(char::is_whitespace) {
        Some(end) if end > 0 => cut[..end].trim_end().to_string(),
        _ => cut,
    }
}

#[derive(Clone)]
pub struct PriceSuggestionService {
    marketplaces: Marketplaces,
    max_results: usize,
}

impl PriceSuggestionService {
    pub fn new(marketplaces: Marketplaces, max_results: usize) -> Self {
        Self {
            marketplaces,
            max_results,
        }
    }

    pub async fn suggest(&self, request: &PriceSuggestionRequest) -> PriceSuggestion {
        let candidates = self
            .marketplaces
            .find_similar(&request.search_query, request.brand.as_deref(), self.max_results)
            .await;
        let found = candidates.len();

        let suggestion = summarize(candidates, request.condition.unwrap_or_default());
        info!(
            query = %request.search_query,
            found,
            sample_size = suggestion.sample_size,
            "Price suggestion computed"
        );
        suggestion
    }
}
