use super::*;
use axum::http::{Method, StatusCode};
use serde_json::Value;

async fn wait_for_history(app: &TestApp, uri: &str) -> anyhow::Result<Vec<Value>> {
    for _ in 0..50 {
        let body = body_json(make_request(&app.router, Method::GET, uri, None).await?).await?;
        let runs = body.as_array().cloned().unwrap_or_default();
        if runs.iter().any(|run| run["status"] == "success" || run["status"] == "error") {
            return Ok(runs);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    anyhow::bail!("job did not finish in time")
}

#[tokio::test]
async fn test_list_jobs() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;

    let response = make_request(&app.router, Method::GET, "/api/scheduler/jobs", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let jobs = body_json(response).await?;
    let ids: Vec<&str> = jobs
        .as_array()
        .map(|jobs| jobs.iter().filter_map(|j| j["id"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(ids, ["refresh_listings", "competitor_prices", "cleanup"]);

    // Scheduling is disabled for tests, so nothing is due.
    assert!(jobs[0]["next_run_time"].is_null());
    assert_eq!(jobs[0]["trigger"], "interval[every 30 minutes]");
    Ok(())
}

#[tokio::test]
async fn test_run_unknown_job() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;

    let response = make_request(&app.router, Method::POST, "/api/scheduler/jobs/backup/run", None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await?;
    assert_eq!(body["code"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn test_manual_run_is_recorded() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;

    let response = make_request(&app.router, Method::POST, "/api/scheduler/jobs/cleanup/run", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "triggered");
    assert_eq!(body["job_id"], "cleanup");
    assert_eq!(body["job_name"], "Cleanup old data");

    let runs = wait_for_history(&app, "/api/scheduler/jobs/cleanup/history").await?;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["status"], "success");
    assert_eq!(runs[0]["result_data"]["listings_deleted"], 0);
    assert!(runs[0]["completed_at"].is_string());
    assert!(runs[0]["error_message"].is_null());

    let all = body_json(make_request(&app.router, Method::GET, "/api/scheduler/history", None).await?).await?;
    assert_eq!(all.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_failing_job_is_recorded_as_error() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;
    sqlx::query("DROP TABLE competitor_prices")
        .execute(app.state.db.pool())
        .await?;

    let response = make_request(&app.router, Method::POST, "/api/scheduler/jobs/cleanup/run", None).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let runs = wait_for_history(&app, "/api/scheduler/jobs/cleanup/history").await?;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["status"], "error");
    assert!(runs[0]["result_data"].is_null());
    assert!(runs[0]["completed_at"].is_string());
    let message = runs[0]["error_message"].as_str().unwrap_or_default();
    assert!(message.contains("competitor_prices"), "{}", message);

    // The scheduler keeps serving after a failed run.
    let response = make_request(&app.router, Method::GET, "/api/scheduler/jobs", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_refresh_run_updates_listings() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;
    let response = make_request(
        &app.router,
        Method::POST,
        "/api/listings",
        Some(serde_json::json!({
            "platform": "vinted",
            "external_id": "555",
            "url": "https://www.vinted.pl/items/555",
            "price": 200.0
        })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    make_request(&app.router, Method::POST, "/api/scheduler/jobs/refresh_listings/run", None).await?;
    let runs = wait_for_history(&app, "/api/scheduler/jobs/refresh_listings/history").await?;
    assert_eq!(runs[0]["status"], "success");
    assert_eq!(runs[0]["result_data"]["updated"], 1);

    let listing = body_json(make_request(&app.router, Method::GET, "/api/listings", None).await?).await?;
    assert_eq!(listing[0]["price"], 180.0);
    assert_eq!(listing[0]["title"], "Buty Nike Air Max 42");
    Ok(())
}

#[tokio::test]
async fn test_history_limit_bounds() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;

    for uri in [
        "/api/scheduler/jobs/cleanup/history?limit=0",
        "/api/scheduler/jobs/cleanup/history?limit=1001",
        "/api/scheduler/history?limit=abc",
    ] {
        let response = make_request(&app.router, Method::GET, uri, None).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }

    let response = make_request(&app.router, Method::GET, "/api/scheduler/jobs/cleanup/history?limit=1000", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
