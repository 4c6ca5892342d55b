use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::jobs::{JobKind, JobRunner};
use crate::utils::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub trigger: String,
    pub next_run_time: Option<DateTime<Utc>>,
}

/// In-process scheduler for the background jobs.
pub struct ListingScheduler {
    scheduler: JobScheduler,
    runner: JobRunner,
    jobs: Arc<RwLock<HashMap<JobKind, Uuid>>>,
    config: SchedulerConfig,
}

impl ListingScheduler {
    pub async fn new(runner: JobRunner, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            runner,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            config,
        })
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    fn trigger_description(&self, kind: JobKind) -> String {
        match kind {
            JobKind::RefreshListings => format!("interval[every {} minutes]", self.config.refresh_interval_minutes),
            JobKind::CompetitorPrices => format!("cron[{}]", self.config.competitor_prices_cron),
            JobKind::Cleanup => format!("cron[{}]", self.config.cleanup_cron),
        }
    }

    fn build_job(&self, kind: JobKind) -> Result<Job> {
        let runner = self.runner.clone();
        let run = move |_uuid: Uuid, _lock: JobScheduler| {
            let runner = runner.clone();
            Box::pin(async move {
                if let Err(e) = runner.run(kind).await {
                    error!("Could not record run of job {}: {}", kind, e);
                }
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        };

        let job = match kind {
            JobKind::RefreshListings => Job::new_repeated_async(
                Duration::from_secs(self.config.refresh_interval_minutes * 60),
                run,
            )?,
            JobKind::CompetitorPrices => Job::new_async(self.config.competitor_prices_cron.as_str(), run)?,
            JobKind::Cleanup => Job::new_async(self.config.cleanup_cron.as_str(), run)?,
        };
        Ok(job)
    }

    /// Registers every job and starts ticking. Does nothing when scheduling is disabled.
    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler disabled; jobs run only when triggered manually");
            return Ok(());
        }

        for kind in JobKind::ALL {
            let job = self.build_job(kind)?;
            let uuid = self.scheduler.add(job).await?;
            self.jobs.write().await.insert(kind, uuid);
            info!("Scheduled job {} ({})", kind, self.trigger_description(kind));
        }

        self.scheduler.start().await?;
        info!("Scheduler started");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler.shutdown().await?;
        self.jobs.write().await.clear();
        info!("Scheduler shut down");
        Ok(())
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobInfo>> {
        let jobs = self.jobs.read().await;
        let mut infos = Vec::with_capacity(JobKind::ALL.len());

        for kind in JobKind::ALL {
            let next_run_time = match jobs.get(&kind) {
                Some(uuid) => self.scheduler.clone().next_tick_for_job(*uuid).await?,
                None => None,
            };
            infos.push(JobInfo {
                id: kind.id().to_string(),
                name: kind.name().to_string(),
                trigger: self.trigger_description(kind),
                next_run_time,
            });
        }
        Ok(infos)
    }

    /// Starts a run in the background and returns immediately.
    pub fn trigger(&self, job_id: &str) -> Result<JobKind> {
        let kind: JobKind = job_id.parse()?;
        let runner = self.runner.clone();

        tokio::spawn(async move {
            if let Err(e) = runner.run(kind).await {
                error!("Could not record run of job {}: {}", kind, e);
            }
        });
        info!("Job {} triggered manually", kind);
        Ok(kind)
    }
}
