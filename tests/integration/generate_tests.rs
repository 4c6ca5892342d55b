use super::*;
use axum::http::{Method, StatusCode};
use serde_json::json;

async fn upload_one(app: &TestApp) -> anyhow::Result<String> {
    let response = make_multipart_request(
        &app.router,
        "/api/generate/upload-images",
        vec![Part::file("files", "photo.png", png_bytes(64, 48))],
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    Ok(body["image_paths"][0].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn test_upload_images() -> anyhow::Result<()> {
    let app = create_test_app(Some("Opis"), Vec::new()).await?;

    let response = make_multipart_request(
        &app.router,
        "/api/generate/upload-images",
        vec![
            Part::file("files", "front.png", png_bytes(32, 32)),
            Part::file("files", "back.jpeg", png_bytes(32, 32)),
            Part::file("files", "notes.txt", b"not an image".to_vec()),
        ],
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["count"], 2);
    for path in body["image_paths"].as_array().cloned().unwrap_or_default() {
        let path = path.as_str().unwrap_or_default().to_string();
        assert!(path.ends_with(".jpg"));
        assert!(std::path::Path::new(&path).exists());
    }
    Ok(())
}

#[tokio::test]
async fn test_upload_limits() -> anyhow::Result<()> {
    let app = create_test_app(Some("Opis"), Vec::new()).await?;

    let too_many = (0..11).map(|_| Part::file("files", "a.png", png_bytes(8, 8))).collect();
    let response = make_multipart_request(&app.router, "/api/generate/upload-images", too_many).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = make_multipart_request(
        &app.router,
        "/api/generate/upload-images",
        vec![Part::file("files", "notes.txt", b"hello".to_vec())],
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["detail"], "Failed to save any images");
    Ok(())
}

#[tokio::test]
async fn test_generate_description_with_price() -> anyhow::Result<()> {
    let app = create_test_app(Some("Sportowe buty Nike w świetnym stanie."), default_hits()).await?;
    let path = upload_one(&app).await?;

    let response = make_multipart_request(
        &app.router,
        "/api/generate/description",
        vec![
            Part::text("image_paths", &path),
            Part::text("category", "shoes"),
            Part::text("brand", "Nike"),
            Part::text("condition", "like_new"),
            Part::text("additional_details", "Air Max"),
        ],
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["category"], "shoes");
    assert_eq!(body["description"], "Sportowe buty Nike w świetnym stanie.");
    assert_eq!(body["sample_size"], 2);
    assert_eq!(body["min_price"], 150.0);
    assert_eq!(body["max_price"], 200.0);
    assert_eq!(body["median_price"], 175.0);
    Ok(())
}

#[tokio::test]
async fn test_generate_description_suggests_category() -> anyhow::Result<()> {
    let app = create_test_app(Some("shoes"), Vec::new()).await?;
    let path = upload_one(&app).await?;

    let response = make_multipart_request(
        &app.router,
        "/api/generate/description",
        vec![
            Part::text("image_paths", &path),
            Part::text("include_price_suggestion", "false"),
        ],
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["category"], "shoes");
    assert_eq!(body["sample_size"], 0);
    assert!(body["suggested_price"].is_null());
    Ok(())
}

#[tokio::test]
async fn test_generate_description_rejects_bad_input() -> anyhow::Result<()> {
    let app = create_test_app(Some("Opis"), Vec::new()).await?;
    let path = upload_one(&app).await?;

    let response = make_multipart_request(
        &app.router,
        "/api/generate/description",
        vec![Part::text("image_paths", " , ")],
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = make_multipart_request(
        &app.router,
        "/api/generate/description",
        vec![Part::text("image_paths", "/etc/passwd")],
    )
    .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let missing = app.upload_dir.path().join("uploads").join("gone.jpg");
    let response = make_multipart_request(
        &app.router,
        "/api/generate/description",
        vec![Part::text("image_paths", &missing.to_string_lossy())],
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = make_multipart_request(
        &app.router,
        "/api/generate/description",
        vec![Part::text("image_paths", &path), Part::text("category", "spaceships")],
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert!(body["detail"].as_str().unwrap_or_default().starts_with("Invalid category"));
    Ok(())
}

#[tokio::test]
async fn test_generate_description_without_providers() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;
    let path = upload_one(&app).await?;

    let response = make_multipart_request(
        &app.router,
        "/api/generate/description",
        vec![Part::text("image_paths", &path), Part::text("category", "shoes")],
    )
    .await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await?;
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    Ok(())
}

#[tokio::test]
async fn test_categories() -> anyhow::Result<()> {
    let app = create_test_app(None, Vec::new()).await?;

    let response = make_request(&app.router, Method::GET, "/api/generate/categories", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    let categories = body["categories"].as_array().cloned().unwrap_or_default();
    assert_eq!(categories.len(), 17);
    assert!(categories.contains(&json!("womens_fashion")));
    assert!(categories.contains(&json!("other")));
    Ok(())
}

#[tokio::test]
async fn test_price_suggestion_endpoint() -> anyhow::Result<()> {
    let app = create_test_app(None, default_hits()).await?;

    let response = make_request(
        &app.router,
        Method::POST,
        "/api/generate/price-suggestion",
        Some(json!({"search_query": "nike air max", "condition": "new"})),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["sample_size"], 2);
    assert_eq!(body["suggested_price"], 150.0);

    let response = make_request(
        &app.router,
        Method::POST,
        "/api/generate/price-suggestion",
        Some(json!({"search_query": ""})),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = make_request(
        &app.router,
        Method::POST,
        "/api/generate/price-suggestion",
        Some(json!({"search_query": "lampa biurkowa"})),
    )
    .await?;
    let body = body_json(response).await?;
    assert_eq!(body["sample_size"], 0);
    assert!(body["suggested_price"].is_null());
    Ok(())
}

#[tokio::test]
async fn test_extract_from_private_url_rejected() -> anyhow::Result<()> {
    let app = create_test_app(Some("{}"), Vec::new()).await?;

    for url in ["http://127.0.0.1/admin", "http://169.254.169.254/latest/meta-data", "ftp://example.com/x"] {
        let response = make_request(
            &app.router,
            Method::POST,
            "/api/generate/extract-from-url",
            Some(json!({ "url": url })),
        )
        .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", url);
    }
    Ok(())
}

#[tokio::test]
async fn test_extract_from_unreachable_url() -> anyhow::Result<()> {
    let app = create_test_app(Some("{}"), Vec::new()).await?;

    let response = make_request(
        &app.router,
        Method::POST,
        "/api/generate/extract-from-url",
        Some(json!({"url": "http://no-such-host.invalid/product"})),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body["detail"].as_str().unwrap_or_default().starts_with("Failed to fetch URL"));
    Ok(())
}
