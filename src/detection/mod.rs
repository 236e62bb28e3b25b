// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection for uploaded images
//!
//! This module provides:
//! - Model provisioning (download-on-miss of the ONNX artifact)
//! - A YOLOv8 detector running on CPU through ONNX Runtime
//! - `DetectionService`, the load-once shared handle used by the HTTP layer
//!
//! Components:
//! - `model` - Detection types and the `ObjectDetector` / `DetectorLoader` traits
//! - `preprocessing` - Letterbox and tensor conversion
//! - `postprocessing` - Output decoding and NMS
//! - `yolo` - ONNX Runtime backed detector
//! - `provisioner` - Model artifact download
//! - `service` - Lazy model lifecycle and timeouts

pub mod image_utils;
pub mod model;
pub mod postprocessing;
pub mod preprocessing;
pub mod provisioner;
pub mod service;
pub mod yolo;

pub use image_utils::{
    content_type_for_extension, decode_image_bytes, detect_format, ImageError, ImageInfo,
};
pub use model::{
    Detection, DetectionResult, DetectorLoader, InferenceError, LoadError, ObjectDetector,
};
pub use postprocessing::PostprocessConfig;
pub use provisioner::{ModelProvisioner, ProvisionError, ProvisionerConfig};
pub use service::{DetectionError, DetectionService};
pub use yolo::{YoloDetector, YoloLoader};
