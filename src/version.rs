// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the object detection node

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Service name used in start-up logs
pub const SERVICE_NAME: &str = "object-detect-node";

/// Detection model family served
pub const MODEL_FAMILY: &str = "yolov8";

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("{} {} ({})", SERVICE_NAME, VERSION_NUMBER, MODEL_FAMILY)
}
