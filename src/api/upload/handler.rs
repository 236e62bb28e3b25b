// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::response::UploadResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::storage::StorageError;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// POST /upload - Store an image and detect objects in it
///
/// # Request
/// `multipart/form-data` with a file field named `image`.
///
/// # Response
/// - `message`: Confirmation including the uploaded filename
/// - `file`: Stored name, retrievable via GET /uploads/{file}
/// - `boxes`, `classes`, `scores`: Parallel detection arrays
/// - `processingTimeMs`: Processing time in milliseconds
///
/// # Errors
/// - 400 Bad Request: Not multipart, no `image` field, no filename, empty file
/// - 500 Internal Server Error: Storage failure, model unavailable, detection failure
pub async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let start = Instant::now();

    let mut multipart = multipart.map_err(|e| {
        warn!("Rejected upload body: {}", e);
        ApiError::Validation(format!("Expected multipart/form-data body: {}", e))
    })?;

    // 1. Find the image field
    let (filename, bytes) = loop {
        let field = multipart.next_field().await.map_err(|e| {
            warn!("Malformed multipart body: {}", e);
            ApiError::Validation(format!("Malformed multipart body: {}", e))
        })?;

        let Some(field) = field else {
            return Err(ApiError::Validation("No image file provided".to_string()));
        };

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.trim().is_empty() {
            return Err(ApiError::Validation("No filename provided".to_string()));
        }

        let bytes = field.bytes().await.map_err(|e| {
            warn!("Failed to read image field: {}", e);
            ApiError::Validation(format!("Failed to read image data: {}", e))
        })?;

        break (filename, bytes);
    };

    if bytes.is_empty() {
        return Err(ApiError::Validation("Uploaded file is empty".to_string()));
    }

    debug!("Upload received: {} ({} bytes)", filename, bytes.len());

    // 2. Persist under a generated name
    let stored = state.uploads.save(&filename, &bytes).await.map_err(|e| match e {
        StorageError::InvalidName(name) => {
            ApiError::Validation(format!("Invalid filename: {}", name))
        }
        other => {
            warn!("Failed to store upload: {}", other);
            ApiError::from(other)
        }
    })?;

    // 3. Detect, provisioning the model on first use
    let result = state.detection.detect(stored.path.clone()).await.map_err(|e| {
        warn!("Detection failed for {}: {}", stored.stored_name, e);
        ApiError::from(e)
    })?;

    let elapsed = elapsed_ms(start);
    info!(
        "Upload {} stored as {}: {} objects, {}ms",
        stored.original_name,
        stored.stored_name,
        result.len(),
        elapsed
    );

    Ok(Json(UploadResponse::new(
        &stored.original_name,
        stored.stored_name,
        &result,
        elapsed,
    )))
}

/// Milliseconds since `start`, saturating at `u64::MAX`
fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
