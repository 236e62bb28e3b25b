// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::api::errors::ApiError;
use crate::api::http_server::AppState;

/// GET /uploads/{filename} - Return stored bytes with an inferred content type
pub async fn uploaded_file_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let file = state.uploads.read(&filename).await.map_err(|e| {
        debug!("Upload lookup failed for {}: {}", filename, e);
        ApiError::from(e)
    })?;

    Ok(([(header::CONTENT_TYPE, file.content_type)], file.bytes).into_response())
}
