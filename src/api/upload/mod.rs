// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload endpoint module
//!
//! Provides POST /upload for storing an image and detecting objects in it.

pub mod handler;
pub mod response;

pub use handler::{upload_handler, IMAGE_FIELD};
pub use response::UploadResponse;
