// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod detection;
pub mod storage;
pub mod version;

pub use api::{create_app, AppState};
pub use config::ServiceConfig;
pub use detection::{DetectionService, ObjectDetector};
pub use storage::UploadStore;
