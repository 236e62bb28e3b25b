// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Flat on-disk store for uploaded images
//!
//! Files are stored under generated `<uuid>.<ext>` names. The client supplied
//! filename is never used as a path; it only survives as response metadata.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::detection::image_utils::{
    content_type_for_extension, detect_format, format_to_extension,
};

const MAX_EXTENSION_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Invalid file name: {0}")]
    InvalidName(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An upload persisted to disk
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Client filename reduced to its final path component
    pub original_name: String,
    /// Generated name inside the upload directory
    pub stored_name: String,
    pub path: PathBuf,
    pub size_bytes: usize,
}

/// A file read back from the store
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the upload directory if needed
    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Persist uploaded bytes under a fresh opaque name
    pub async fn save(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredUpload, StorageError> {
        let original_name = sanitize_filename(original_name)
            .ok_or_else(|| StorageError::InvalidName(original_name.to_string()))?;

        let stored_name = match extension_for(&original_name, bytes) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        self.init().await?;
        let path = self.root.join(&stored_name);
        tokio::fs::write(&path, bytes).await?;

        debug!(
            "Stored upload {} as {} ({} bytes)",
            original_name,
            stored_name,
            bytes.len()
        );

        Ok(StoredUpload {
            original_name,
            stored_name,
            path,
            size_bytes: bytes.len(),
        })
    }

    /// Read a stored file back by its stored name
    pub async fn read(&self, name: &str) -> Result<StoredFile, StorageError> {
        if !is_plain_name(name) {
            return Err(StorageError::InvalidName(name.to_string()));
        }

        let bytes = match tokio::fs::read(self.root.join(name)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let content_type = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(content_type_for_extension)
            .unwrap_or("application/octet-stream");

        Ok(StoredFile {
            bytes,
            content_type,
        })
    }
}

/// Reduce an untrusted client filename to a safe display name
///
/// Keeps only the last path component, treating both `/` and `\` as
/// separators. Returns `None` when nothing usable remains (`""`, `..`, `a/`).
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next()?.trim();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned)
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(|c| c.is_control())
}

/// Extension for the stored file: the client's if it is sane, else sniffed
fn extension_for(name: &str, bytes: &[u8]) -> Option<String> {
    let from_name = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| {
            !e.is_empty()
                && e.len() <= MAX_EXTENSION_LEN
                && e.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|e| e.to_ascii_lowercase());

    from_name.or_else(|| {
        detect_format(bytes)
            .ok()
            .map(|f| format_to_extension(f).to_string())
    })
}
