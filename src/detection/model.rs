// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection types and the capabilities a detection backend must provide

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// One recognised object instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// `[x1, y1, x2, y2]` in pixel space of the original image
    pub bbox: [f32; 4],
    /// Index into the model's label set
    pub class_id: i64,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f32,
}

/// All detections for one image, ordered by descending confidence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub image_width: u32,
    pub image_height: u32,
}

impl DetectionResult {
    pub fn empty(image_width: u32, image_height: u32) -> Self {
        Self {
            detections: Vec::new(),
            image_width,
            image_height,
        }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn boxes(&self) -> Vec<[f32; 4]> {
        self.detections.iter().map(|d| d.bbox).collect()
    }

    pub fn classes(&self) -> Vec<i64> {
        self.detections.iter().map(|d| d.class_id).collect()
    }

    pub fn scores(&self) -> Vec<f32> {
        self.detections.iter().map(|d| d.confidence).collect()
    }
}

/// Failure to turn a model artifact into a runnable detector
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Model file not found: {0}")]
    NotFound(String),
    #[error("Invalid model {path}: {reason}")]
    InvalidModel { path: String, reason: String },
}

/// Failure while running detection on one image
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Failed to read image {path}: {reason}")]
    ImageRead { path: String, reason: String },
    #[error("Malformed image: {0}")]
    ImageDecode(String),
    #[error("Detection engine error: {0}")]
    Engine(String),
}

/// A loaded detection model
///
/// Implementations are shared across request tasks behind an `Arc`, and
/// `detect` is called from blocking worker threads.
pub trait ObjectDetector: Send + Sync {
    /// Run detection on the image stored at `image_path`
    fn detect(&self, image_path: &Path) -> Result<DetectionResult, InferenceError>;

    /// Short identifier used in logs and health output
    fn name(&self) -> &str;
}

/// Builds an [`ObjectDetector`] from a model artifact on disk
pub trait DetectorLoader: Send + Sync {
    fn load(&self, model_path: &Path) -> Result<Arc<dyn ObjectDetector>, LoadError>;
}
