// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOv8 output decoding and non-maximum suppression

use ndarray::ArrayView2;

use super::model::Detection;
use super::preprocessing::Letterbox;

/// Thresholds applied to raw model predictions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostprocessConfig {
    /// Minimum best-class score for a candidate to be kept
    pub confidence_threshold: f32,
    /// Overlap above which a lower-scored box of the same class is dropped
    pub iou_threshold: f32,
    /// Upper bound on detections returned per image
    pub max_detections: usize,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
        }
    }
}

/// Decode a YOLOv8 prediction matrix into detections in original image space
///
/// `predictions` has shape `[4 + num_classes, num_candidates]`: rows 0..4
/// are `cx, cy, w, h` in model input pixels, the remaining rows are class
/// scores.
pub fn decode_predictions(
    predictions: ArrayView2<f32>,
    letterbox: &Letterbox,
    image_width: u32,
    image_height: u32,
    config: &PostprocessConfig,
) -> Vec<Detection> {
    let (rows, candidates) = predictions.dim();
    if rows <= 4 {
        return Vec::new();
    }

    let max_x = image_width as f32;
    let max_y = image_height as f32;
    let mut detections = Vec::new();

    for i in 0..candidates {
        let (class_id, score) = (4..rows)
            .map(|r| (r - 4, predictions[[r, i]]))
            .fold((0usize, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        // Negated so NaN scores are dropped too
        if !(score >= config.confidence_threshold) {
            continue;
        }

        let cx = predictions[[0, i]];
        let cy = predictions[[1, i]];
        let half_w = predictions[[2, i]].abs() / 2.0;
        let half_h = predictions[[3, i]].abs() / 2.0;

        let (x1, y1) = letterbox.unmap(cx - half_w, cy - half_h);
        let (x2, y2) = letterbox.unmap(cx + half_w, cy + half_h);

        let bbox = [
            x1.clamp(0.0, max_x),
            y1.clamp(0.0, max_y),
            x2.clamp(0.0, max_x),
            y2.clamp(0.0, max_y),
        ];

        if !bbox.iter().all(|v| v.is_finite()) {
            continue;
        }

        detections.push(Detection {
            bbox,
            class_id: class_id as i64,
            confidence: score,
        });
    }

    let mut kept = non_max_suppression(detections, config.iou_threshold);
    kept.truncate(config.max_detections);
    kept
}

/// Intersection over union of two `[x1, y1, x2, y2]` boxes
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let intersection = inter_w * inter_h;

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - intersection;

    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Greedy per-class NMS; output is sorted by descending confidence
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}
