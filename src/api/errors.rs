// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detection::DetectionError;
use crate::storage::StorageError;

/// JSON error body: `{error}` for client errors, `{error, detail}` otherwise
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    /// Model could not be provisioned or loaded
    ModelUnavailable(String),
    InferenceFailed(String),
    Storage(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let (error, detail) = match self {
            ApiError::Validation(msg) => (msg.clone(), None),
            ApiError::NotFound(msg) => (msg.clone(), None),
            ApiError::ModelUnavailable(detail) => {
                ("Detection model unavailable".to_string(), Some(detail.clone()))
            }
            ApiError::InferenceFailed(detail) => {
                ("Object detection failed".to_string(), Some(detail.clone()))
            }
            ApiError::Storage(detail) => {
                ("Failed to store upload".to_string(), Some(detail.clone()))
            }
        };

        ErrorResponse { error, detail }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::ModelUnavailable(_) | ApiError::InferenceFailed(_) | ApiError::Storage(_) => {
                500
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ModelUnavailable(msg) => write!(f, "Model unavailable: {}", msg),
            ApiError::InferenceFailed(msg) => write!(f, "Inference failed: {}", msg),
            ApiError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<DetectionError> for ApiError {
    fn from(e: DetectionError) -> Self {
        match e {
            DetectionError::Provision(_) | DetectionError::Load(_) => {
                ApiError::ModelUnavailable(e.to_string())
            }
            DetectionError::Inference(_) | DetectionError::Timeout(_) => {
                ApiError::InferenceFailed(e.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(name) => ApiError::NotFound(format!("File not found: {}", name)),
            StorageError::InvalidName(name) => {
                ApiError::NotFound(format!("File not found: {}", name))
            }
            StorageError::Io(e) => ApiError::Storage(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}
