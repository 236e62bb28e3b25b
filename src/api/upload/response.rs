// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload response types

use serde::{Deserialize, Serialize};

use crate::detection::DetectionResult;

/// Response from a successful upload
///
/// `boxes`, `classes` and `scores` are parallel arrays in descending
/// confidence order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Human readable confirmation naming the uploaded file
    pub message: String,
    /// Stored name, retrievable through GET /uploads/{file}
    pub file: String,
    /// `[x1, y1, x2, y2]` in original image pixels
    pub boxes: Vec<[f32; 4]>,
    /// COCO class index per box
    pub classes: Vec<i64>,
    /// Confidence per box (0.0-1.0)
    pub scores: Vec<f32>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl UploadResponse {
    pub fn new(
        original_name: &str,
        stored_name: String,
        result: &DetectionResult,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            message: format!("✅ Image saved and analyzed: {}", original_name),
            file: stored_name,
            boxes: result.boxes(),
            classes: result.classes(),
            scores: result.scores(),
            processing_time_ms,
        }
    }
}
