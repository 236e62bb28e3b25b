// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! GET / and GET /health tests

use axum::http::StatusCode;
use std::sync::Arc;
use tower::util::ServiceExt;

use super::support::{
    app_with_detector, app_with_unreachable_model, blank_png, body_bytes, body_json, get_request,
    upload_request, EmptyDetector,
};

#[tokio::test]
async fn test_index_returns_status_text() {
    let t = app_with_unreachable_model();

    let response = t.app.clone().oneshot(get_request("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(text.contains("running"));
}

#[tokio::test]
async fn test_health_reports_model_state() {
    let t = app_with_detector(Arc::new(EmptyDetector));

    let json = body_json(t.app.clone().oneshot(get_request("/health")).await.unwrap()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["model_loaded"], false);
    assert!(json["model"].is_null());
    assert_eq!(json["version"], object_detect_node::version::VERSION_NUMBER);

    let response = t
        .app
        .clone()
        .oneshot(upload_request("image", Some("blank.png"), &blank_png(10, 10)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(t.app.clone().oneshot(get_request("/health")).await.unwrap()).await;
    assert_eq!(json["model_loaded"], true);
    assert_eq!(json["model"], "empty");
}

#[tokio::test]
async fn test_service_starts_without_model() {
    let t = app_with_unreachable_model();

    let response = t.app.clone().oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["model_loaded"], false);
}
