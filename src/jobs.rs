use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::db::Database;
use crate::listing_manager::{ListingManager, RefreshOutcome};
use crate::models::{JobExecution, JobOutcome, NewCompetitorPrice};
use crate::pricing::SIMILARITY_THRESHOLD;
use crate::scraper::Marketplaces;
use crate::utils::error::{AppError, Result};

/// The background jobs the service knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    RefreshListings,
    CompetitorPrices,
    Cleanup,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::RefreshListings, JobKind::CompetitorPrices, JobKind::Cleanup];

    pub fn id(&self) -> &'static str {
        match self {
            JobKind::RefreshListings => "refresh_listings",
            JobKind::CompetitorPrices => "competitor_prices",
            JobKind::Cleanup => "cleanup",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::RefreshListings => "Refresh active listings",
            JobKind::CompetitorPrices => "Scrape competitor prices",
            JobKind::Cleanup => "Cleanup old data",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for JobKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| AppError::not_found(format!("Job {}", s)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub total_listings: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitorReport {
    pub total_listings: usize,
    pub total_competitors_found: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub competitor_prices_deleted: u64,
    pub price_history_deleted: u64,
    pub listings_deleted: u64,
}

/// Runs jobs and keeps the execution log. Scheduled and manual runs both go
/// through [`JobRunner::run`].
#[derive(Clone)]
pub struct JobRunner {
    db: Database,
    listings: ListingManager,
    marketplaces: Marketplaces,
    config: SchedulerConfig,
    max_results: usize,
}

impl JobRunner {
    pub fn new(
        listings: ListingManager,
        marketplaces: Marketplaces,
        config: SchedulerConfig,
        max_results: usize,
    ) -> Self {
        Self {
            db: listings.db().clone(),
            listings,
            marketplaces,
            config,
            max_results,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Executes one run and records it. Job failures end up in the record;
    /// only a failure to write the record itself is returned as an error.
    pub async fn run(&self, kind: JobKind) -> Result<JobExecution> {
        let mut execution = self
            .db
            .insert_job_execution(&JobExecution::pending(kind.id(), kind.name()))
            .await?;
        execution.start()?;
        self.db.update_job_execution(&execution).await?;
        info!(job = kind.id(), execution = execution.id, "Job started");

        let outcome = match self.execute(kind).await {
            Ok(result) => {
                info!(job = kind.id(), %result, "Job finished");
                JobOutcome::Success(result)
            }
            Err(e) => {
                error!(job = kind.id(), "Job failed: {}", e);
                JobOutcome::Error(e.to_string())
            }
        };

        execution.finish(outcome)?;
        self.db.update_job_execution(&execution).await?;
        metrics::counter!("job_runs_total", "job" => kind.id(), "status" => execution.status.as_str())
            .increment(1);
        Ok(execution)
    }

    async fn execute(&self, kind: JobKind) -> Result<serde_json::Value> {
        let result = match kind {
            JobKind::RefreshListings => serde_json::to_value(self.refresh_listings().await?)?,
            JobKind::CompetitorPrices => serde_json::to_value(self.competitor_prices().await?)?,
            JobKind::Cleanup => serde_json::to_value(self.cleanup().await?)?,
        };
        Ok(result)
    }

    pub async fn refresh_listings(&self) -> Result<RefreshReport> {
        let listings = self.db.active_listings(self.config.max_listings as i64).await?;
        let mut report = RefreshReport {
            total_listings: listings.len(),
            ..Default::default()
        };

        for listing in &listings {
            match self.listings.refresh(listing).await {
                Ok(RefreshOutcome::Updated { .. }) => report.updated += 1,
                Ok(RefreshOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!("Failed to refresh listing {}: {}", listing.id, e);
                    report.errors += 1;
                }
            }
        }
        Ok(report)
    }

    pub async fn competitor_prices(&self) -> Result<CompetitorReport> {
        let listings = self.db.active_listings(self.config.max_listings as i64).await?;
        let mut report = CompetitorReport {
            total_listings: listings.len(),
            ..Default::default()
        };

        for listing in &listings {
            let query = [listing.brand.as_deref(), listing.title.as_deref()]
                .into_iter()
                .flatten()
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if query.is_empty() {
                continue;
            }

            let matches = self
                .marketplaces
                .find_similar(&query, listing.brand.as_deref(), self.max_results)
                .await;
            for item in matches
                .into_iter()
                .filter(|item| item.similarity_score >= SIMILARITY_THRESHOLD && item.url != listing.url)
            {
                let stored = self
                    .db
                    .insert_competitor_price(&NewCompetitorPrice {
                        listing_id: listing.id,
                        platform: item.platform,
                        competitor_url: item.url,
                        competitor_title: Some(item.title),
                        price: item.price,
                        similarity_score: Some(item.similarity_score),
                    })
                    .await;
                match stored {
                    Ok(_) => report.total_competitors_found += 1,
                    Err(e) => {
                        warn!("Failed to store competitor price for listing {}: {}", listing.id, e);
                        report.errors += 1;
                    }
                }
            }
        }
        Ok(report)
    }

    pub async fn cleanup(&self) -> Result<CleanupReport> {
        let now = Utc::now();
        Ok(CleanupReport {
            competitor_prices_deleted: self
                .db
                .delete_competitor_prices_before(now - Duration::days(self.config.competitor_retention_days))
                .await?,
            price_history_deleted: self
                .db
                .delete_price_history_before(now - Duration::days(self.config.price_history_retention_days))
                .await?,
            listings_deleted: self
                .db
                .delete_removed_listings_before(now - Duration::days(self.config.removed_listing_retention_days))
                .await?,
        })
    }
}
