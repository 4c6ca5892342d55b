use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

use crate::models::JobStatus;
use crate::utils::error::{AppError, Result};

/// One run of a scheduled job. Moves `pending -> running -> success | error`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobExecution {
    pub id: i64,
    pub job_id: String,
    pub job_name: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_data: Option<Json<serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Success(serde_json::Value),
    Error(String),
}

impl JobExecution {
    pub fn pending(job_id: impl Into<String>, job_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            job_id: job_id.into(),
            job_name: job_name.into(),
            status: JobStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            result_data: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.status != JobStatus::Pending {
            return Err(AppError::Internal(format!(
                "Job execution {} cannot start from status {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.status = JobStatus::Running;
        self.started_at = Utc::now();
        Ok(())
    }

    pub fn finish(&mut self, outcome: JobOutcome) -> Result<()> {
        if self.status != JobStatus::Running {
            return Err(AppError::Internal(format!(
                "Job execution {} cannot finish from status {}",
                self.id,
                self.status.as_str()
            )));
        }

        match outcome {
            JobOutcome::Success(result) => {
                self.status = JobStatus::Success;
                self.result_data = Some(Json(result));
                self.error_message = None;
            }
            JobOutcome::Error(message) => {
                self.status = JobStatus::Error;
                self.error_message = Some(message);
                self.result_data = None;
            }
        }
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Terminal runs carry exactly one of a result payload or an error message.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            JobStatus::Pending | JobStatus::Running => {
                self.completed_at.is_none() && self.error_message.is_none() && self.result_data.is_none()
            }
            JobStatus::Success => {
                self.completed_at.is_some() && self.result_data.is_some() && self.error_message.is_none()
            }
            JobStatus::Error => {
                self.completed_at.is_some() && self.error_message.is_some() && self.result_data.is_none()
            }
        }
    }
}
