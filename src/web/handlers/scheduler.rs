use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::jobs::JobKind;
use crate::models::JobExecution;
use crate::scheduler::JobInfo;
use crate::web::{check_range, ApiResult, AppQuery, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/:job_id/history", get(job_history))
        .route("/jobs/:job_id/run", post(run_job))
        .route("/history", get(all_history))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub status: String,
    pub job_id: String,
    pub job_name: String,
}

pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Vec<JobInfo>>> {
    Ok(Json(state.scheduler.list_jobs().await?))
}

pub async fn job_history(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    AppQuery(params): AppQuery<HistoryParams>,
) -> ApiResult<Json<Vec<JobExecution>>> {
    let limit = check_range("limit", params.limit.unwrap_or(50), 1, 1000)?;
    Ok(Json(state.db.job_executions(Some(&job_id), limit).await?))
}

pub async fn all_history(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<HistoryParams>,
) -> ApiResult<Json<Vec<JobExecution>>> {
    let limit = check_range("limit", params.limit.unwrap_or(100), 1, 1000)?;
    Ok(Json(state.db.job_executions(None, limit).await?))
}

pub async fn run_job(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Json<TriggerResponse>> {
    let kind: JobKind = state.scheduler.trigger(&job_id)?;
    Ok(Json(TriggerResponse {
        status: "triggered".to_string(),
        job_id: kind.id().to_string(),
        job_name: kind.name().to_string(),
    }))
}
