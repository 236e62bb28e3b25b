// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod upload_store;

pub use upload_store::{sanitize_filename, StorageError, StoredFile, StoredUpload, UploadStore};
