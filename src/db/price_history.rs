use chrono::{DateTime, Utc};

use super::Database;
use crate::models::{PriceHistory, next_recorded_at};
use crate::utils::error::Result;

impl Database {
    /// Appends a price point, keeping the listing's series time-ordered.
    pub async fn record_price(&self, listing_id: i64, price: f64) -> Result<PriceHistory> {
        let mut tx = self.pool.begin().await?;

        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT recorded_at FROM price_history WHERE listing_id = ? ORDER BY julianday(recorded_at) DESC, id DESC LIMIT 1",
        )
        .bind(listing_id)
        .fetch_optional(&mut *tx)
        .await?;

        let point = sqlx::query_as::<_, PriceHistory>(
            "INSERT INTO price_history (listing_id, price, recorded_at) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(listing_id)
        .bind(price)
        .bind(next_recorded_at(latest, Utc::now()))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(point)
    }

    /// Most recent points first.
    pub async fn price_history(&self, listing_id: i64, limit: i64) -> Result<Vec<PriceHistory>> {
        let points = sqlx::query_as::<_, PriceHistory>(
            "SELECT * FROM price_history WHERE listing_id = ? ORDER BY julianday(recorded_at) DESC, id DESC LIMIT ?",
        )
        .bind(listing_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(points)
    }

    pub async fn delete_price_history_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM price_history WHERE julianday(recorded_at) < julianday(?)")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
