// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! GET /uploads/{filename} tests

use axum::http::{header, StatusCode};
use std::sync::Arc;
use tower::util::ServiceExt;

use super::support::{
    app_with_detector, blank_png, body_bytes, body_json, get_request, upload_request,
    EmptyDetector,
};

#[tokio::test]
async fn test_round_trip_returns_exact_bytes() {
    let t = app_with_detector(Arc::new(EmptyDetector));
    let png = blank_png(12, 8);

    let response = t
        .app
        .clone()
        .oneshot(upload_request("image", Some("round.png"), &png))
        .await
        .unwrap();
    let file = body_json(response).await["file"]
        .as_str()
        .unwrap()
        .to_string();

    let response = t
        .app
        .clone()
        .oneshot(get_request(&format!("/uploads/{}", file)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    assert_eq!(body_bytes(response).await, png);
}

#[tokio::test]
async fn test_unknown_extension_is_octet_stream() {
    let t = app_with_detector(Arc::new(EmptyDetector));
    std::fs::create_dir_all(&t.upload_dir).unwrap();
    std::fs::write(t.upload_dir.join("blob.xyz"), b"raw").unwrap();

    let response = t
        .app
        .clone()
        .oneshot(get_request("/uploads/blob.xyz"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/octet-stream"
    );
    assert_eq!(body_bytes(response).await, b"raw");
}

#[tokio::test]
async fn test_missing_file_is_404() {
    let t = app_with_detector(Arc::new(EmptyDetector));

    let response = t
        .app
        .clone()
        .oneshot(get_request("/uploads/nothing-here.png"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_encoded_traversal_is_404() {
    let t = app_with_detector(Arc::new(EmptyDetector));
    std::fs::write(t.dir.path().join("secret.txt"), b"top secret").unwrap();

    let response = t
        .app
        .clone()
        .oneshot(get_request("/uploads/..%2Fsecret.txt"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
