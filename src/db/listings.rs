use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite};

use super::Database;
use crate::models::{Listing, ListingFilter, ListingRefresh, ListingStatus, NewListing, Platform};
use crate::utils::error::{AppError, Result};

impl Database {
    pub async fn insert_listing(&self, new: &NewListing) -> Result<Listing> {
        let now = Utc::now();
        let result = sqlx::query_as::<_, Listing>(
            r#"
            INSERT INTO listings (
                platform, external_id, url, title, description, price, currency,
                category, brand, condition, size, views, images, platform_metadata,
                status, posted_at, initial_cost, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(new.platform)
        .bind(&new.external_id)
        .bind(&new.url)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.price)
        .bind(&new.currency)
        .bind(&new.category)
        .bind(&new.brand)
        .bind(&new.condition)
        .bind(&new.size)
        .bind(new.views)
        .bind(new.images.clone().map(Json))
        .bind(new.platform_metadata.clone().map(Json))
        .bind(new.status)
        .bind(new.posted_at)
        .bind(new.initial_cost)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(listing) => Ok(listing),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(format!(
                "Listing {} already exists on {}",
                new.external_id, new.platform
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_listing(&self, id: i64) -> Result<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(listing)
    }

    pub async fn find_listing_by_external_id(
        &self,
        platform: Platform,
        external_id: &str,
    ) -> Result<Option<Listing>> {
        let listing = sqlx::query_as::<_, Listing>(
            "SELECT * FROM listings WHERE platform = ? AND external_id = ?",
        )
        .bind(platform)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(listing)
    }

    pub async fn list_listings(&self, filter: &ListingFilter, skip: i64, limit: i64) -> Result<Vec<Listing>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM listings WHERE 1 = 1");
        if let Some(platform) = filter.platform {
            query.push(" AND platform = ").push_bind(platform);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        query
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(skip);

        let listings = query.build_query_as::<Listing>().fetch_all(&self.pool).await?;
        Ok(listings)
    }

    pub async fn active_listings(&self, limit: i64) -> Result<Vec<Listing>> {
        let listings = sqlx::query_as::<_, Listing>(
            "SELECT * FROM listings WHERE status = ? ORDER BY id LIMIT ?",
        )
        .bind(ListingStatus::Active)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(listings)
    }

    /// Persists every mutable column of an existing listing.
    pub async fn save_listing(&self, listing: &Listing) -> Result<Listing> {
        let saved = sqlx::query_as::<_, Listing>(
            r#"
            UPDATE listings SET
                url = ?, title = ?, description = ?, price = ?, currency = ?,
                category = ?, brand = ?, condition = ?, size = ?, views = ?,
                images = ?, platform_metadata = ?, status = ?, posted_at = ?,
                sold_at = ?, sale_price = ?, initial_cost = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&listing.url)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.price)
        .bind(&listing.currency)
        .bind(&listing.category)
        .bind(&listing.brand)
        .bind(&listing.condition)
        .bind(&listing.size)
        .bind(listing.views)
        .bind(listing.images.clone())
        .bind(listing.platform_metadata.clone())
        .bind(listing.status)
        .bind(listing.posted_at)
        .bind(listing.sold_at)
        .bind(listing.sale_price)
        .bind(listing.initial_cost)
        .bind(listing.updated_at)
        .bind(listing.id)
        .fetch_optional(&self.pool)
        .await?;

        saved.ok_or_else(|| AppError::not_found(format!("Listing {}", listing.id)))
    }

    /// Writes freshly scraped page fields onto a listing that is still active.
    ///
    /// Returns `None` when the listing is gone or no longer active, so a sale or
    /// removal recorded after the caller read the row is left untouched.
    /// Otherwise returns whether the stored price changed.
    pub async fn apply_refresh(&self, id: i64, refresh: &ListingRefresh) -> Result<Option<bool>> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query(
            r#"
            UPDATE listings SET
                title = COALESCE(?, title),
                views = COALESCE(?, views),
                images = COALESCE(?, images),
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(&refresh.title)
        .bind(refresh.views)
        .bind(refresh.images.clone().map(Json))
        .bind(Utc::now())
        .bind(id)
        .bind(ListingStatus::Active)
        .execute(&mut *tx)
        .await?;
        if touched.rows_affected() == 0 {
            return Ok(None);
        }

        let price_changed = match refresh.price {
            Some(price) => {
                sqlx::query(
                    "UPDATE listings SET price = ? WHERE id = ? AND (price IS NULL OR price <> ?)",
                )
                .bind(price)
                .bind(id)
                .bind(price)
                .execute(&mut *tx)
                .await?
                .rows_affected()
                    > 0
            }
            None => false,
        };

        tx.commit().await?;
        Ok(Some(price_changed))
    }

    pub async fn delete_listing(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM listings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard-deletes listings soft-removed before the cutoff.
    pub async fn delete_removed_listings_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM listings WHERE status = ? AND julianday(updated_at) < julianday(?)",
        )
        .bind(ListingStatus::Removed)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
