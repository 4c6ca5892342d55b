use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::AppError;

pub mod competitor_price;
pub mod job_execution;
pub mod listing;
pub mod price_history;

pub use competitor_price::*;
pub use job_execution::*;
pub use listing::*;
pub use price_history::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT")]
pub enum Platform {
    #[sqlx(rename = "olx")]
    Olx,
    #[sqlx(rename = "vinted")]
    Vinted,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Olx, Platform::Vinted];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Olx => "olx",
            Platform::Vinted => "vinted",
        }
    }

    /// Registrable domains serving this marketplace's listing pages.
    pub fn domains(&self) -> &'static [&'static str] {
        match self {
            Platform::Olx => &["olx.pl"],
            Platform::Vinted => &[
                "vinted.pl",
                "vinted.com",
                "vinted.co.uk",
                "vinted.de",
                "vinted.fr",
                "vinted.cz",
                "vinted.lt",
            ],
        }
    }

    /// True for one of the marketplace domains or any of their subdomains.
    pub fn owns_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.domains()
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "olx" => Ok(Platform::Olx),
            "vinted" => Ok(Platform::Vinted),
            other => Err(AppError::Validation(format!(
                "Unsupported platform '{}'. Expected one of: olx, vinted",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT")]
pub enum ListingStatus {
    #[sqlx(rename = "active")]
    Active,
    #[sqlx(rename = "sold")]
    Sold,
    #[sqlx(rename = "removed")]
    Removed,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    New,
    LikeNew,
    #[default]
    Good,
    Fair,
    Poor,
}

impl ItemCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCondition::New => "new",
            ItemCondition::LikeNew => "like_new",
            ItemCondition::Good => "good",
            ItemCondition::Fair => "fair",
            ItemCondition::Poor => "poor",
        }
    }

    /// Position within the sorted market prices an item in this condition should aim for.
    pub fn price_percentile(&self) -> f64 {
        match self {
            ItemCondition::New => 0.9,
            ItemCondition::LikeNew => 0.8,
            ItemCondition::Good => 0.6,
            ItemCondition::Fair => 0.4,
            ItemCondition::Poor => 0.2,
        }
    }
}

impl FromStr for ItemCondition {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "new" => Ok(ItemCondition::New),
            "like_new" => Ok(ItemCondition::LikeNew),
            "good" => Ok(ItemCondition::Good),
            "fair" => Ok(ItemCondition::Fair),
            "poor" => Ok(ItemCondition::Poor),
            other => Err(AppError::Validation(format!(
                "Invalid condition '{}'. Expected one of: new, like_new, good, fair, poor",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Pl,
    En,
}

impl FromStr for Language {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pl" => Ok(Language::Pl),
            "en" => Ok(Language::En),
            other => Err(AppError::Validation(format!(
                "Invalid language '{}'. Expected one of: pl, en",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT")]
pub enum JobStatus {
    #[sqlx(rename = "pending")]
    Pending,
    #[sqlx(rename = "running")]
    Running,
    #[sqlx(rename = "success")]
    Success,
    #[sqlx(rename = "error")]
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        }
    }
}
