use super::*;
use axum::http::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
async fn test_add_by_url_and_duplicate() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;
    let payload = json!({"url": "https://www.olx.pl/d/oferta/buty-nike-CID767-IDabc.html", "platform": "olx"});

    let response = make_request(&app.router, Method::POST, "/api/listings/add-by-url", Some(payload.clone())).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let listing = body_json(response).await?;
    assert_eq!(listing["external_id"], "buty-nike-CID767-IDabc.html");
    assert_eq!(listing["title"], "Buty Nike Air Max 42");
    assert_eq!(listing["status"], "active");

    let response = make_request(&app.router, Method::POST, "/api/listings/add-by-url", Some(payload)).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error = body_json(response).await?;
    assert_eq!(error["code"], "CONFLICT");

    // Same external id on the other marketplace is a separate listing.
    let response = make_request(
        &app.router,
        Method::POST,
        "/api/listings/add-by-url",
        Some(json!({"url": "https://www.vinted.pl/d/buty-nike-CID767-IDabc.html", "platform": "vinted"})),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn test_add_by_url_validation() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;

    let response = make_request(
        &app.router,
        Method::POST,
        "/api/listings/add-by-url",
        Some(json!({"url": "https://allegro.pl/oferta/1", "platform": "allegro"})),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await?;
    assert!(error["detail"].as_str().unwrap_or_default().contains("allegro"));

    let response = make_request(
        &app.router,
        Method::POST,
        "/api/listings/add-by-url",
        Some(json!({"url": "https://www.olx.pl/", "platform": "olx"})),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = make_request(
        &app.router,
        Method::POST,
        "/api/listings/add-by-url",
        Some(json!({"platform": "olx"})),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_unscrapable_page_gives_minimal_listing() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;

    let response = make_request(
        &app.router,
        Method::POST,
        "/api/listings/add-by-url",
        Some(json!({"url": "https://www.vinted.pl/items/missing-1", "platform": "vinted", "initial_cost": 25.0})),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let listing = body_json(response).await?;
    assert!(listing["title"].is_null());
    assert_eq!(listing["initial_cost"], 25.0);
    Ok(())
}

#[tokio::test]
async fn test_manual_create_list_and_filter() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;

    for (platform, id) in [("olx", "a1"), ("vinted", "b1"), ("vinted", "b2")] {
        let response = make_request(
            &app.router,
            Method::POST,
            "/api/listings",
            Some(json!({
                "platform": platform,
                "external_id": id,
                "url": format!("https://example.com/{}", id),
                "title": format!("Item {}", id),
                "price": 40.0
            })),
        )
        .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = make_request(&app.router, Method::GET, "/api/listings?platform=vinted", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let listings = body_json(response).await?;
    assert_eq!(listings.as_array().map(Vec::len), Some(2));

    let response = make_request(&app.router, Method::GET, "/api/listings?limit=1", None).await?;
    let listings = body_json(response).await?;
    assert_eq!(listings.as_array().map(Vec::len), Some(1));

    let response = make_request(&app.router, Method::GET, "/api/listings?limit=0", None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = make_request(&app.router, Method::GET, "/api/listings?limit=101", None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_mark_sold_rules() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;
    let response = make_request(
        &app.router,
        Method::POST,
        "/api/listings/add-by-url",
        Some(json!({"url": "https://www.vinted.pl/items/321", "platform": "vinted"})),
    )
    .await?;
    let id = body_json(response).await?["id"].as_i64().unwrap_or_default();

    let response = make_request(
        &app.router,
        Method::POST,
        &format!("/api/listings/{}/mark-sold", id),
        Some(json!({"sale_price": 0.0})),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = make_request(
        &app.router,
        Method::PATCH,
        &format!("/api/listings/{}", id),
        Some(json!({"status": "sold"})),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = make_request(
        &app.router,
        Method::POST,
        &format!("/api/listings/{}/mark-sold", id),
        Some(json!({"sale_price": 170.0})),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let sold = body_json(response).await?;
    assert_eq!(sold["status"], "sold");
    assert!(!sold["sold_at"].is_null());
    Ok(())
}

#[tokio::test]
async fn test_delete_listing() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;
    let response = make_request(
        &app.router,
        Method::POST,
        "/api/listings/add-by-url",
        Some(json!({"url": "https://www.vinted.pl/items/900", "platform": "vinted"})),
    )
    .await?;
    let id = body_json(response).await?["id"].as_i64().unwrap_or_default();

    let response = make_request(&app.router, Method::DELETE, &format!("/api/listings/{}", id), None).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = make_request(&app.router, Method::GET, &format!("/api/listings/{}", id), None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error = body_json(response).await?;
    assert_eq!(error["code"], "NOT_FOUND");

    let response = make_request(&app.router, Method::DELETE, &format!("/api/listings/{}", id), None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_add_by_url_rejects_internal_and_foreign_hosts() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;

    for (url, platform) in [
        ("http://127.0.0.1:8080/admin/secret", "olx"),
        ("http://10.1.2.3/items/1", "vinted"),
        ("http://localhost/items/1", "vinted"),
        ("https://www.vinted.pl/items/1", "olx"),
        ("https://shop.example.org/items/1", "vinted"),
    ] {
        let response = make_request(
            &app.router,
            Method::POST,
            "/api/listings/add-by-url",
            Some(json!({ "url": url, "platform": platform })),
        )
        .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", url);
    }

    let listings = body_json(make_request(&app.router, Method::GET, "/api/listings", None).await?).await?;
    assert_eq!(listings.as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn test_refresh_does_not_undo_sale() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;
    let response = make_request(
        &app.router,
        Method::POST,
        "/api/listings",
        Some(json!({
            "platform": "vinted",
            "external_id": "777",
            "url": "https://www.vinted.pl/items/777",
            "price": 200.0
        })),
    )
    .await?;
    let id = body_json(response).await?["id"].as_i64().unwrap_or_default();

    // The refresh job works from the rows it read when it started.
    let snapshot = app.state.db.active_listings(100).await?;

    let response = make_request(
        &app.router,
        Method::POST,
        &format!("/api/listings/{}/mark-sold", id),
        Some(json!({"sale_price": 150.0})),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    app.state.listings.refresh(&snapshot[0]).await?;

    let listing = body_json(make_request(&app.router, Method::GET, &format!("/api/listings/{}", id), None).await?).await?;
    assert_eq!(listing["status"], "sold");
    assert_eq!(listing["sale_price"], 150.0);
    assert_eq!(listing["price"], 200.0);
    assert!(!listing["sold_at"].is_null());
    Ok(())
}
