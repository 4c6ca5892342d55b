use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::Platform;

/// Snapshot of a similar item seen on a marketplace. Later scrapes add new rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CompetitorPrice {
    pub id: i64,
    pub listing_id: i64,
    pub platform: Platform,
    pub competitor_url: String,
    pub competitor_title: Option<String>,
    pub price: f64,
    pub similarity_score: Option<f64>,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCompetitorPrice {
    pub listing_id: i64,
    pub platform: Platform,
    pub competitor_url: String,
    pub competitor_title: Option<String>,
    pub price: f64,
    pub similarity_score: Option<f64>,
}
