// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Runtime configuration for the detection upload service
//!
//! Every setting is read from the environment and falls back to a default.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::detection::{PostprocessConfig, ProvisionerConfig};

/// Default remote source for the YOLOv8n ONNX export
pub const DEFAULT_MODEL_URL: &str =
    "https://github.com/ultralytics/assets/releases/download/v8.2.0/yolov8n.onnx";

pub const DEFAULT_PORT: u16 = 10000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Configuration for the HTTP service and its model
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind address (default: 0.0.0.0)
    pub host: String,
    /// Listen port (default: 10000)
    pub port: u16,
    /// Directory uploads are persisted to (default: uploads)
    pub upload_dir: PathBuf,
    /// Local model artifact path (default: models/yolov8n.onnx)
    pub model_path: PathBuf,
    /// Remote model source used when the artifact is missing
    pub model_url: String,
    /// Optional hex SHA-256 of the artifact
    pub model_sha256: Option<String>,
    /// Download timeout in seconds (default: 300)
    pub model_fetch_timeout_secs: u64,
    /// Per-request inference timeout in seconds (default: 30)
    pub inference_timeout_secs: u64,
    /// Maximum request body size (default: 10MB)
    pub max_upload_bytes: usize,
    /// Detection score cut-off (default: 0.25)
    pub confidence_threshold: f32,
    /// NMS overlap threshold (default: 0.7)
    pub iou_threshold: f32,
    /// Maximum detections per image (default: 300)
    pub max_detections: usize,
    /// Load the model at start-up instead of on the first upload
    pub preload_model: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from("uploads"),
            model_path: PathBuf::from("models/yolov8n.onnx"),
            model_url: DEFAULT_MODEL_URL.to_string(),
            model_sha256: None,
            model_fetch_timeout_secs: 300,
            inference_timeout_secs: 30,
            max_upload_bytes: 10 * 1024 * 1024,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
            preload_model: false,
        }
    }
}

fn parse_var<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.parse().ok())
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_var(var("PORT")).unwrap_or(defaults.port),
            upload_dir: var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            model_path: var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            model_url: var("MODEL_URL").unwrap_or(defaults.model_url),
            model_sha256: var("MODEL_SHA256").map(|v| v.to_lowercase()),
            model_fetch_timeout_secs: parse_var(var("MODEL_FETCH_TIMEOUT_SECS"))
                .unwrap_or(defaults.model_fetch_timeout_secs),
            inference_timeout_secs: parse_var(var("INFERENCE_TIMEOUT_SECS"))
                .unwrap_or(defaults.inference_timeout_secs),
            max_upload_bytes: parse_var(var("MAX_UPLOAD_BYTES"))
                .unwrap_or(defaults.max_upload_bytes),
            confidence_threshold: parse_var(var("CONFIDENCE_THRESHOLD"))
                .unwrap_or(defaults.confidence_threshold),
            iou_threshold: parse_var(var("IOU_THRESHOLD")).unwrap_or(defaults.iou_threshold),
            max_detections: parse_var(var("MAX_DETECTIONS"))
                .unwrap_or(defaults.max_detections),
            preload_model: var("PRELOAD_MODEL")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.preload_model),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                field: "PORT",
                message: "must be between 1 and 65535".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid {
                field: "CONFIDENCE_THRESHOLD",
                message: format!("{} is outside 0.0-1.0", self.confidence_threshold),
            });
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(ConfigError::Invalid {
                field: "IOU_THRESHOLD",
                message: format!("{} is outside 0.0-1.0", self.iou_threshold),
            });
        }
        if self.model_fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "MODEL_FETCH_TIMEOUT_SECS",
                message: "must be at least 1".to_string(),
            });
        }
        if self.inference_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "INFERENCE_TIMEOUT_SECS",
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "MAX_UPLOAD_BYTES",
                message: "must be at least 1".to_string(),
            });
        }
        if let Some(hash) = &self.model_sha256 {
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::Invalid {
                    field: "MODEL_SHA256",
                    message: "must be 64 hex characters".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn provisioner_config(&self) -> ProvisionerConfig {
        ProvisionerConfig {
            model_path: self.model_path.clone(),
            model_url: self.model_url.clone(),
            fetch_timeout: Duration::from_secs(self.model_fetch_timeout_secs),
            expected_sha256: self.model_sha256.clone(),
        }
    }

    pub fn postprocess_config(&self) -> PostprocessConfig {
        PostprocessConfig {
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            max_detections: self.max_detections,
        }
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }
}
