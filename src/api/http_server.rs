// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::files::uploaded_file_handler;
use super::upload::upload_handler;
use crate::config::ServiceConfig;
use crate::detection::{DetectionService, ModelProvisioner, YoloLoader};
use crate::storage::UploadStore;
use crate::version;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub detection: Arc<DetectionService>,
    pub uploads: Arc<UploadStore>,
}

impl AppState {
    /// Wire the production detection service and upload store from config
    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let provisioner = ModelProvisioner::new(config.provisioner_config())
            .context("failed to build model provisioner")?;
        let loader = Arc::new(
            YoloLoader::new(config.postprocess_config())
                .with_session_wait(config.inference_timeout()),
        );
        let detection =
            DetectionService::new(provisioner, loader, config.inference_timeout());

        Ok(Self {
            detection: Arc::new(detection),
            uploads: Arc::new(UploadStore::new(&config.upload_dir)),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    /// Name of the resident detector, absent until the first load succeeds
    pub model: Option<String>,
    pub version: String,
}

/// Build the router; `max_upload_bytes` caps request bodies
pub fn create_app(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/upload", post(upload_handler))
        .route("/uploads/:filename", get(uploaded_file_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: ServiceConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;

    state
        .uploads
        .init()
        .await
        .with_context(|| format!("failed to create upload dir {}", config.upload_dir.display()))?;

    if config.preload_model {
        state.detection.warm_up().await;
    }

    let app = create_app(state, config.max_upload_bytes);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("✅ Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn index_handler() -> &'static str {
    "✅ YOLO image detection server is running"
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let model = state.detection.model_name().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        model_loaded: model.is_some(),
        model,
        version: version::VERSION_NUMBER.to_string(),
    })
}
