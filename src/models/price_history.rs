use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PriceHistory {
    pub id: i64,
    pub listing_id: i64,
    pub price: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Timestamp for a new point in a listing's series: never earlier than the latest point.
pub fn next_recorded_at(latest: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match latest {
        Some(latest) if latest > now => latest,
        _ => now,
    }
}
