use super::Database;
use crate::models::JobExecution;
use crate::utils::error::{AppError, Result};

impl Database {
    pub async fn insert_job_execution(&self, execution: &JobExecution) -> Result<JobExecution> {
        let row = sqlx::query_as::<_, JobExecution>(
            r#"
            INSERT INTO job_executions (
                job_id, job_name, status, started_at, completed_at, error_message, result_data
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&execution.job_id)
        .bind(&execution.job_name)
        .bind(execution.status)
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(&execution.error_message)
        .bind(execution.result_data.clone())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_job_execution(&self, execution: &JobExecution) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE job_executions
            SET status = ?, started_at = ?, completed_at = ?, error_message = ?, result_data = ?
            WHERE id = ?
            "#,
        )
        .bind(execution.status)
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(&execution.error_message)
        .bind(execution.result_data.clone())
        .bind(execution.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Job execution {}", execution.id)));
        }
        Ok(())
    }

    /// Newest first, optionally restricted to one job.
    pub async fn job_executions(&self, job_id: Option<&str>, limit: i64) -> Result<Vec<JobExecution>> {
        let rows = match job_id {
            Some(job_id) => {
                sqlx::query_as::<_, JobExecution>(
                    "SELECT * FROM job_executions WHERE job_id = ? ORDER BY id DESC LIMIT ?",
                )
                .bind(job_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, JobExecution>("SELECT * FROM job_executions ORDER BY id DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }
}
