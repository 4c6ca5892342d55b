use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use url::Url;
use validator::Validate;

use crate::models::{ListingStatus, Platform};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Listing {
    pub id: i64,
    pub platform: Platform,
    pub external_id: String,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub condition: Option<String>,
    pub size: Option<String>,
    pub views: i64,
    pub images: Option<Json<Vec<String>>>,
    pub platform_metadata: Option<Json<serde_json::Value>>,
    pub status: ListingStatus,
    pub posted_at: Option<DateTime<Utc>>,
    pub sold_at: Option<DateTime<Utc>>,
    pub sale_price: Option<f64>,
    pub initial_cost: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_currency() -> String {
    "PLN".to_string()
}

fn default_status() -> ListingStatus {
    ListingStatus::Active
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewListing {
    pub platform: Platform,
    #[validate(length(min = 1, max = 100))]
    pub external_id: String,
    #[validate(url)]
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[serde(default = "default_currency")]
    #[validate(length(min = 3, max = 3))]
    pub currency: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(max = 50))]
    pub condition: Option<String>,
    #[validate(length(max = 50))]
    pub size: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub views: i64,
    pub images: Option<Vec<String>>,
    pub platform_metadata: Option<serde_json::Value>,
    #[serde(default = "default_status")]
    pub status: ListingStatus,
    pub posted_at: Option<DateTime<Utc>>,
    #[validate(range(exclusive_min = 0.0))]
    pub initial_cost: Option<f64>,
}

impl NewListing {
    /// Minimal listing for a URL whose page could not be scraped.
    pub fn minimal(platform: Platform, external_id: String, url: String, initial_cost: Option<f64>) -> Self {
        Self {
            platform,
            external_id,
            url,
            title: None,
            description: None,
            price: None,
            currency: default_currency(),
            category: None,
            brand: None,
            condition: None,
            size: None,
            views: 0,
            images: None,
            platform_metadata: None,
            status: ListingStatus::Active,
            posted_at: None,
            initial_cost,
        }
    }

    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if self.status == ListingStatus::Sold {
            return Err(AppError::Validation(
                "A listing cannot be created as sold; use mark-sold to record a sale".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateListing {
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(length(min = 3, max = 3))]
    pub currency: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(max = 50))]
    pub condition: Option<String>,
    #[validate(length(max = 50))]
    pub size: Option<String>,
    #[validate(range(min = 0))]
    pub views: Option<i64>,
    pub images: Option<Vec<String>>,
    pub status: Option<ListingStatus>,
    #[validate(range(exclusive_min = 0.0))]
    pub initial_cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkSold {
    pub sale_price: f64,
    pub sold_at: Option<DateTime<Utc>>,
}

/// Page fields re-read by a refresh. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingRefresh {
    pub title: Option<String>,
    pub views: Option<i64>,
    pub images: Option<Vec<String>>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingFilter {
    pub platform: Option<Platform>,
    pub status: Option<ListingStatus>,
}

impl Listing {
    /// Applies a partial edit. Returns true when the price changed.
    pub fn apply_update(&mut self, update: UpdateListing) -> Result<bool> {
        update.validate()?;

        if update.status == Some(ListingStatus::Sold) && self.status != ListingStatus::Sold {
            return Err(AppError::Validation(
                "Status 'sold' can only be set through mark-sold".to_string(),
            ));
        }

        let mut price_changed = false;
        if let Some(price) = update.price {
            if self.price != Some(price) {
                price_changed = true;
                self.price = Some(price);
            }
        }

        if let Some(title) = update.title {
            self.title = Some(title);
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(currency) = update.currency {
            self.currency = currency;
        }
        if let Some(category) = update.category {
            self.category = Some(category);
        }
        if let Some(brand) = update.brand {
            self.brand = Some(brand);
        }
        if let Some(condition) = update.condition {
            self.condition = Some(condition);
        }
        if let Some(size) = update.size {
            self.size = Some(size);
        }
        if let Some(views) = update.views {
            self.views = views;
        }
        if let Some(images) = update.images {
            self.images = Some(Json(images));
        }
        if let Some(initial_cost) = update.initial_cost {
            self.initial_cost = Some(initial_cost);
        }
        if let Some(status) = update.status {
            if self.status == ListingStatus::Sold && status != ListingStatus::Sold {
                self.sale_price = None;
                self.sold_at = None;
            }
            self.status = status;
        }

        self.updated_at = Utc::now();
        Ok(price_changed)
    }

    pub fn mark_sold(&mut self, sold: MarkSold) -> Result<()> {
        if !sold.sale_price.is_finite() || sold.sale_price <= 0.0 {
            return Err(AppError::Validation(
                "Sale price must be greater than 0".to_string(),
            ));
        }

        let now = Utc::now();
        self.status = ListingStatus::Sold;
        self.sale_price = Some(sold.sale_price);
        self.sold_at = Some(sold.sold_at.unwrap_or(now));
        self.updated_at = now;
        Ok(())
    }

    pub fn profit(&self) -> Option<f64> {
        match (self.sale_price, self.initial_cost) {
            (Some(sale), Some(cost)) => Some(sale - cost),
            _ => None,
        }
    }

    pub fn image_urls(&self) -> &[String] {
        self.images.as_ref().map(|j| j.0.as_slice()).unwrap_or_default()
    }
}

/// The listing id on the marketplace is the last non-empty path segment of its URL.
pub fn external_id_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Validation("Invalid URL: cannot extract listing ID".to_string()))
}
