use chrono::{DateTime, Utc};

use super::Database;
use crate::models::{CompetitorPrice, NewCompetitorPrice};
use crate::utils::error::Result;

impl Database {
    pub async fn insert_competitor_price(&self, new: &NewCompetitorPrice) -> Result<CompetitorPrice> {
        let row = sqlx::query_as::<_, CompetitorPrice>(
            r#"
            INSERT INTO competitor_prices (
                listing_id, platform, competitor_url, competitor_title, price, similarity_score, scraped_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(new.listing_id)
        .bind(new.platform)
        .bind(&new.competitor_url)
        .bind(&new.competitor_title)
        .bind(new.price)
        .bind(new.similarity_score)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Latest snapshots first.
    pub async fn competitor_prices(&self, listing_id: i64, limit: i64) -> Result<Vec<CompetitorPrice>> {
        let rows = sqlx::query_as::<_, CompetitorPrice>(
            "SELECT * FROM competitor_prices WHERE listing_id = ? ORDER BY julianday(scraped_at) DESC, id DESC LIMIT ?",
        )
        .bind(listing_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete_competitor_prices_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM competitor_prices WHERE julianday(scraped_at) < julianday(?)")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
