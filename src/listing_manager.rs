use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;
use validator::Validate;

use crate::ai::url_guard::check_public_url;
use crate::db::Database;
use crate::models::{
    external_id_from_url, Listing, ListingFilter, ListingRefresh, MarkSold, NewListing, Platform,
    UpdateListing,
};
use crate::scraper::{Marketplaces, ScrapedListing};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddByUrlRequest {
    #[validate(url)]
    pub url: String,
    /// Kept as text so an unknown marketplace is reported as a validation error.
    pub platform: String,
    #[validate(range(exclusive_min = 0.0))]
    pub initial_cost: Option<f64>,
}

/// What a refresh did to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated { price_changed: bool },
    /// Sold, removed or deleted since it was read; nothing was written.
    Skipped,
}

#[derive(Clone)]
pub struct ListingManager {
    db: Database,
    marketplaces: Marketplaces,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn truncated(value: Option<String>, max_chars: usize) -> Option<String> {
    non_empty(value).map(|v| v.chars().take(max_chars).collect())
}

/// Only public pages on the platform's own domains are ever fetched.
pub fn check_listing_url(platform: Platform, raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())?;
    check_public_url(&url)?;
    match url.host_str() {
        Some(host) if platform.owns_host(host) => Ok(url),
        _ => Err(AppError::Validation(format!(
            "URL is not a {} listing: expected a host under {}",
            platform,
            platform.domains().join(", ")
        ))),
    }
}

/// Fills a new listing from a scraped page, respecting the column limits.
fn apply_scraped(new: &mut NewListing, scraped: ScrapedListing) {
    new.title = non_empty(scraped.title);
    new.description = non_empty(scraped.description);
    new.price = scraped.price.filter(|p| p.is_finite() && *p >= 0.0);
    if let Some(currency) = scraped.currency.filter(|c| c.len() == 3) {
        new.currency = currency;
    }
    new.category = truncated(scraped.category, 100);
    new.brand = truncated(scraped.brand, 100);
    new.condition = truncated(scraped.condition, 50);
    new.size = truncated(scraped.size, 50);
    new.views = scraped.views.unwrap_or(0).max(0);
    if !scraped.images.is_empty() {
        new.images = Some(scraped.images);
    }
}

impl ListingManager {
    pub fn new(db: Database, marketplaces: Marketplaces) -> Self {
        Self { db, marketplaces }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Tracks one of the user's marketplace listings by its URL. When the page
    /// cannot be scraped, a minimal listing holding only the URL is stored.
    pub async fn add_by_url(&self, request: AddByUrlRequest) -> Result<Listing> {
        let platform: Platform = request.platform.parse()?;
        request.validate()?;
        check_listing_url(platform, &request.url)?;
        let external_id = external_id_from_url(&request.url)?;

        if self.db.find_listing_by_external_id(platform, &external_id).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Listing {} already exists on {}",
                external_id, platform
            )));
        }

        let mut new = NewListing::minimal(platform, external_id, request.url.clone(), request.initial_cost);
        match self.marketplaces.fetch_listing(platform, &request.url).await {
            Ok(scraped) => apply_scraped(&mut new, scraped),
            Err(e) => warn!("Could not scrape {}, storing minimal listing: {}", request.url, e),
        }
        new.check()?;

        self.create_checked(&new).await
    }

    pub async fn create(&self, new: NewListing) -> Result<Listing> {
        new.check()?;
        self.create_checked(&new).await
    }

    async fn create_checked(&self, new: &NewListing) -> Result<Listing> {
        let listing = self.db.insert_listing(new).await?;
        if let Some(price) = listing.price {
            self.db.record_price(listing.id, price).await?;
        }
        info!("Created listing {} ({} {})", listing.id, listing.platform, listing.external_id);
        Ok(listing)
    }

    pub async fn get(&self, id: i64) -> Result<Listing> {
        self.db
            .get_listing(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Listing {}", id)))
    }

    pub async fn list(&self, filter: &ListingFilter, skip: i64, limit: i64) -> Result<Vec<Listing>> {
        self.db.list_listings(filter, skip, limit).await
    }

    pub async fn update(&self, id: i64, update: UpdateListing) -> Result<Listing> {
        let mut listing = self.get(id).await?;
        let price_changed = listing.apply_update(update)?;
        let saved = self.db.save_listing(&listing).await?;

        if price_changed {
            if let Some(price) = saved.price {
                self.db.record_price(saved.id, price).await?;
            }
        }
        Ok(saved)
    }

    pub async fn mark_sold(&self, id: i64, sold: MarkSold) -> Result<Listing> {
        let mut listing = self.get(id).await?;
        listing.mark_sold(sold)?;
        let saved = self.db.save_listing(&listing).await?;
        info!("Listing {} sold for {:?}", saved.id, saved.sale_price);
        Ok(saved)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.db.delete_listing(id).await? {
            return Err(AppError::not_found(format!("Listing {}", id)));
        }
        info!("Deleted listing {}", id);
        Ok(())
    }

    /// Re-reads the listing page and stores title, price, views and images.
    /// A changed price is appended to the price history. Listings that stopped
    /// being active after `listing` was read are left as they are.
    pub async fn refresh(&self, listing: &Listing) -> Result<RefreshOutcome> {
        check_listing_url(listing.platform, &listing.url)?;
        let scraped = self.marketplaces.fetch_listing(listing.platform, &listing.url).await?;

        let refresh = ListingRefresh {
            title: non_empty(scraped.title),
            views: scraped.views.map(|v| v.max(0)),
            images: (!scraped.images.is_empty()).then_some(scraped.images),
            price: scraped.price.filter(|p| p.is_finite() && *p >= 0.0),
        };

        match self.db.apply_refresh(listing.id, &refresh).await? {
            None => {
                debug!("Listing {} is no longer active, refresh skipped", listing.id);
                Ok(RefreshOutcome::Skipped)
            }
            Some(price_changed) => {
                if let (true, Some(price)) = (price_changed, refresh.price) {
                    self.db.record_price(listing.id, price).await?;
                }
                Ok(RefreshOutcome::Updated { price_changed })
            }
        }
    }
}
