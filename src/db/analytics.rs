use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Database;
use crate::models::ListingStatus;
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    /// SQLite expression bucketing a timestamp column. Weeks start on Monday.
    fn bucket(&self, column: &str) -> String {
        match self {
            Period::Daily => format!("date({})", column),
            Period::Weekly => format!("date({}, 'weekday 0', '-6 days')", column),
            Period::Monthly => format!("strftime('%Y-%m', {})", column),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct AnalyticsSummary {
    pub total_listings: i64,
    pub active_listings: i64,
    pub sold_listings: i64,
    pub total_revenue: f64,
    pub avg_sale_price: f64,
    pub total_profit: f64,
    pub negative_profit_count: i64,
    pub inventory_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct SalesBucket {
    pub period: String,
    pub sales_count: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CreatedBucket {
    pub period: String,
    pub listings_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesOverTime {
    pub sales: Vec<SalesBucket>,
    pub listings_created: Vec<CreatedBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CategorySales {
    pub category: String,
    pub sales_count: i64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct BrandSales {
    pub brand: String,
    pub sales_count: i64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ProfitableItem {
    pub id: i64,
    pub title: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub sale_price: f64,
    pub initial_cost: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct FastSale {
    pub id: i64,
    pub title: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub sold_at: Option<DateTime<Utc>>,
    pub days_to_sell: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BestSellers {
    pub best_categories: Vec<CategorySales>,
    pub best_brands: Vec<BrandSales>,
    pub most_profitable: Vec<ProfitableItem>,
    pub fastest_selling: Vec<FastSale>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CategoryValue {
    pub category: String,
    pub total_value: f64,
    pub items_count: i64,
    pub avg_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryValue {
    pub total_value: f64,
    pub total_items: i64,
    pub avg_time_to_sell_days: Option<f64>,
    pub by_category: Vec<CategoryValue>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl Database {
    pub async fn analytics_summary(&self) -> Result<AnalyticsSummary> {
        let summary = sqlx::query_as::<_, AnalyticsSummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM listings WHERE status IN ('active', 'sold')) AS total_listings,
                (SELECT COUNT(*) FROM listings WHERE status = 'active') AS active_listings,
                (SELECT COUNT(*) FROM listings WHERE status = 'sold') AS sold_listings,
                (SELECT COALESCE(SUM(sale_price), 0.0) FROM listings
                    WHERE status = 'sold' AND sale_price IS NOT NULL) AS total_revenue,
                (SELECT COALESCE(AVG(sale_price), 0.0) FROM listings
                    WHERE status = 'sold' AND sale_price IS NOT NULL) AS avg_sale_price,
                (SELECT COALESCE(SUM(sale_price - initial_cost), 0.0) FROM listings
                    WHERE status = 'sold' AND sale_price IS NOT NULL AND initial_cost IS NOT NULL) AS total_profit,
                (SELECT COUNT(*) FROM listings
                    WHERE status = 'sold' AND sale_price < initial_cost) AS negative_profit_count,
                (SELECT COALESCE(SUM(price), 0.0) FROM listings
                    WHERE status = 'active' AND price IS NOT NULL) AS inventory_value
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    pub async fn sales_over_time(&self, period: Period, days: i64) -> Result<SalesOverTime> {
        let cutoff = Utc::now() - Duration::days(days);

        let sales_sql = format!(
            r#"
            SELECT {bucket} AS period, COUNT(id) AS sales_count, COALESCE(SUM(sale_price), 0.0) AS revenue
            FROM listings
            WHERE status = ? AND sold_at IS NOT NULL AND julianday(sold_at) >= julianday(?)
            GROUP BY period
            ORDER BY period
            "#,
            bucket = period.bucket("sold_at")
        );
        let sales = sqlx::query_as::<_, SalesBucket>(&sales_sql)
            .bind(ListingStatus::Sold)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        let created_sql = format!(
            r#"
            SELECT {bucket} AS period, COUNT(id) AS listings_count
            FROM listings
            WHERE julianday(created_at) >= julianday(?)
            GROUP BY period
            ORDER BY period
            "#,
            bucket = period.bucket("created_at")
        );
        let listings_created = sqlx::query_as::<_, CreatedBucket>(&created_sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        Ok(SalesOverTime {
            sales,
            listings_created,
        })
    }

    pub async fn best_sellers(&self, limit: i64) -> Result<BestSellers> {
        let best_categories = sqlx::query_as::<_, CategorySales>(
            r#"
            SELECT category, COUNT(id) AS sales_count, COALESCE(SUM(sale_price), 0.0) AS total_revenue
            FROM listings
            WHERE status = 'sold' AND category IS NOT NULL
            GROUP BY category
            ORDER BY sales_count DESC, total_revenue DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let best_brands = sqlx::query_as::<_, BrandSales>(
            r#"
            SELECT brand, COUNT(id) AS sales_count, COALESCE(SUM(sale_price), 0.0) AS total_revenue
            FROM listings
            WHERE status = 'sold' AND brand IS NOT NULL
            GROUP BY brand
            ORDER BY sales_count DESC, total_revenue DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let most_profitable = sqlx::query_as::<_, ProfitableItem>(
            r#"
            SELECT id, title, category, brand, sale_price, initial_cost,
                   sale_price - initial_cost AS profit
            FROM listings
            WHERE status = 'sold' AND sale_price IS NOT NULL AND initial_cost IS NOT NULL
            ORDER BY profit DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut fastest_selling = sqlx::query_as::<_, FastSale>(
            r#"
            SELECT id, title, category, brand, posted_at, sold_at,
                   julianday(sold_at) - julianday(posted_at) AS days_to_sell
            FROM listings
            WHERE status = 'sold' AND posted_at IS NOT NULL AND sold_at IS NOT NULL
            ORDER BY days_to_sell ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        for item in &mut fastest_selling {
            item.days_to_sell = item.days_to_sell.map(round1);
        }

        Ok(BestSellers {
            best_categories,
            best_brands,
            most_profitable,
            fastest_selling,
        })
    }

    pub async fn inventory_value(&self) -> Result<InventoryValue> {
        let (total_value, total_items): (f64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(price), 0.0), COUNT(id) FROM listings WHERE status = 'active' AND price IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        let by_category = sqlx::query_as::<_, CategoryValue>(
            r#"
            SELECT category, SUM(price) AS total_value, COUNT(id) AS items_count, AVG(price) AS avg_price
            FROM listings
            WHERE status = 'active' AND price IS NOT NULL AND category IS NOT NULL
            GROUP BY category
            ORDER BY total_value DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let avg_days: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT AVG(julianday(sold_at) - julianday(posted_at))
            FROM listings
            WHERE status = 'sold' AND posted_at IS NOT NULL AND sold_at IS NOT NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(InventoryValue {
            total_value,
            total_items,
            avg_time_to_sell_days: avg_days.map(round1),
            by_category,
        })
    }
}
