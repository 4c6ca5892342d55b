use super::*;
use axum::http::{Method, StatusCode};
use listing_buddy::models::{MarkSold, NewCompetitorPrice, NewListing};

async fn seed(app: &TestApp) -> anyhow::Result<Vec<i64>> {
    let mut ids = Vec::new();
    let items = [
        ("coat-1", "womens_fashion", "Zara", 120.0, 40.0),
        ("coat-2", "womens_fashion", "Mango", 80.0, 30.0),
        ("phone-1", "electronics", "Apple", 900.0, 1000.0),
    ];
    for (external_id, category, brand, price, cost) in items {
        let mut new = NewListing::minimal(
            Platform::Vinted,
            external_id.to_string(),
            format!("https://www.vinted.pl/items/{}", external_id),
            Some(cost),
        );
        new.title = Some(external_id.to_string());
        new.category = Some(category.to_string());
        new.brand = Some(brand.to_string());
        new.price = Some(price);
        ids.push(app.state.listings.create(new).await?.id);
    }

    // Sold below cost.
    app.state
        .listings
        .mark_sold(ids[2], MarkSold { sale_price: 850.0, sold_at: None })
        .await?;
    Ok(ids)
}

#[tokio::test]
async fn test_summary_empty_database() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;

    let response = make_request(&app.router, Method::GET, "/api/analytics/summary", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["total_listings"], 0);
    assert_eq!(body["total_revenue"], 0.0);
    assert_eq!(body["avg_sale_price"], 0.0);
    assert_eq!(body["inventory_value"], 0.0);
    Ok(())
}

#[tokio::test]
async fn test_summary_counts_losses() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;
    seed(&app).await?;

    let body = body_json(make_request(&app.router, Method::GET, "/api/analytics/summary", None).await?).await?;
    assert_eq!(body["total_listings"], 3);
    assert_eq!(body["active_listings"], 2);
    assert_eq!(body["sold_listings"], 1);
    assert_eq!(body["total_revenue"], 850.0);
    assert_eq!(body["total_profit"], -150.0);
    assert_eq!(body["negative_profit_count"], 1);
    assert_eq!(body["inventory_value"], 200.0);
    Ok(())
}

#[tokio::test]
async fn test_sales_over_time_bounds() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;
    seed(&app).await?;

    for uri in [
        "/api/analytics/sales-over-time?days=0",
        "/api/analytics/sales-over-time?days=366",
        "/api/analytics/sales-over-time?period=hourly",
    ] {
        let response = make_request(&app.router, Method::GET, uri, None).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }

    let response = make_request(
        &app.router,
        Method::GET,
        "/api/analytics/sales-over-time?period=weekly&days=7",
        None,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["sales"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["sales"][0]["sales_count"], 1);
    assert_eq!(body["listings_created"][0]["listings_count"], 3);
    Ok(())
}

#[tokio::test]
async fn test_best_sellers_and_inventory() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;
    seed(&app).await?;

    let response = make_request(&app.router, Method::GET, "/api/analytics/best-sellers?limit=51", None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(make_request(&app.router, Method::GET, "/api/analytics/best-sellers", None).await?).await?;
    assert_eq!(body["best_categories"][0]["category"], "electronics");
    assert_eq!(body["best_brands"][0]["brand"], "Apple");
    assert_eq!(body["most_profitable"][0]["profit"], -150.0);
    // Nothing was posted with a date, so time-to-sell is unknown.
    assert_eq!(body["fastest_selling"].as_array().map(Vec::len), Some(0));

    let body = body_json(make_request(&app.router, Method::GET, "/api/analytics/inventory-value", None).await?).await?;
    assert_eq!(body["total_value"], 200.0);
    assert_eq!(body["total_items"], 2);
    assert!(body["avg_time_to_sell_days"].is_null());
    assert_eq!(body["by_category"][0]["category"], "womens_fashion");
    assert_eq!(body["by_category"][0]["items_count"], 2);
    assert_eq!(body["by_category"][0]["avg_price"], 100.0);
    Ok(())
}

#[tokio::test]
async fn test_price_monitoring() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;
    let ids = seed(&app).await?;

    app.state
        .db
        .insert_competitor_price(&NewCompetitorPrice {
            listing_id: ids[0],
            platform: Platform::Olx,
            competitor_url: "https://www.olx.pl/d/oferta/plaszcz-zara".to_string(),
            competitor_title: Some("Płaszcz Zara".to_string()),
            price: 110.0,
            similarity_score: Some(0.64),
        })
        .await?;

    let uri = format!("/api/analytics/price-monitoring/{}", ids[0]);
    let body = body_json(make_request(&app.router, Method::GET, &uri, None).await?).await?;
    assert_eq!(body["listing_id"], ids[0]);
    assert_eq!(body["competitor_prices"][0]["price"], 110.0);
    assert_eq!(body["competitor_prices"][0]["platform"], "olx");

    let uri = format!("/api/analytics/price-monitoring/{}/history", ids[0]);
    let body = body_json(make_request(&app.router, Method::GET, &uri, None).await?).await?;
    assert_eq!(body["price_history"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["price_history"][0]["price"], 120.0);

    let uri = format!("/api/analytics/price-monitoring/{}/history?limit=501", ids[0]);
    let response = make_request(&app.router, Method::GET, &uri, None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown listings simply have no data.
    let body = body_json(make_request(&app.router, Method::GET, "/api/analytics/price-monitoring/999", None).await?).await?;
    assert_eq!(body["competitor_prices"].as_array().map(Vec::len), Some(0));
    Ok(())
}
