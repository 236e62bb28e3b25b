// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model artifact provisioning
//!
//! Makes sure the detection model exists on local disk, downloading it from
//! the configured URL on first use. Downloads land in a temporary file next
//! to the destination and are renamed into place only once complete, so a
//! failed fetch never leaves a partial artifact behind.

use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { status: u16, url: String },
    #[error("Timeout after {secs}s fetching {url}")]
    Timeout { url: String, secs: u64 },
    #[error("Empty response body from {0}")]
    EmptyBody(String),
    #[error("Checksum mismatch - expected: {expected}, actual: {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("IO error: {0}")]
    Io(String),
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Where the model lives locally and where to get it from
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub model_path: PathBuf,
    pub model_url: String,
    pub fetch_timeout: Duration,
    /// Lowercase hex SHA-256 of the artifact; verification is skipped when unset
    pub expected_sha256: Option<String>,
}

pub struct ModelProvisioner {
    config: ProvisionerConfig,
    client: Client,
}

impl std::fmt::Debug for ModelProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelProvisioner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ModelProvisioner {
    pub fn new(config: ProvisionerConfig) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ProvisionError::Client(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn model_path(&self) -> &Path {
        &self.config.model_path
    }

    /// Return the local model path, downloading the artifact if it is absent
    ///
    /// Idempotent: an existing file is returned without any network access.
    pub async fn ensure_model_available(&self) -> Result<PathBuf, ProvisionError> {
        let path = &self.config.model_path;
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            debug!("Model artifact present at {}", path.display());
            return Ok(path.clone());
        }

        info!(
            "Model artifact missing at {}, downloading from {}",
            path.display(),
            self.config.model_url
        );

        let start = Instant::now();
        let size = self.download(path).await?;

        info!(
            "✅ Model artifact downloaded: {} bytes in {}ms",
            size,
            start.elapsed().as_millis()
        );

        Ok(path.clone())
    }

    async fn download(&self, dest: &Path) -> Result<u64, ProvisionError> {
        let url = &self.config.model_url;
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProvisionError::Io(format!("create {}: {}", dir.display(), e)))?;

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Model download from {} returned HTTP {}", url, status);
            return Err(ProvisionError::HttpStatus {
                status: status.as_u16(),
                url: url.clone(),
            });
        }

        // Dropped (and removed) on every early return below
        let tmp = tempfile::Builder::new()
            .prefix(".model-download-")
            .tempfile_in(&dir)
            .map_err(|e| ProvisionError::Io(e.to_string()))?;
        let mut file = tmp
            .reopen()
            .map(tokio::fs::File::from_std)
            .map_err(|e| ProvisionError::Io(e.to_string()))?;

        let mut hasher = Sha256::new();
        let mut written: u64 = 0;

        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| ProvisionError::Io(e.to_string()))?;
            written += chunk.len() as u64;
        }

        if written == 0 {
            return Err(ProvisionError::EmptyBody(url.clone()));
        }

        if let Some(expected) = &self.config.expected_sha256 {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(ProvisionError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        file.flush()
            .await
            .map_err(|e| ProvisionError::Io(e.to_string()))?;
        file.sync_all()
            .await
            .map_err(|e| ProvisionError::Io(e.to_string()))?;
        drop(file);

        let target = dest.to_path_buf();
        tokio::task::spawn_blocking(move || tmp.persist(&target).map(|_| ()))
            .await
            .map_err(|e| ProvisionError::Io(format!("persist task failed: {e}")))?
            .map_err(|e| ProvisionError::Io(format!("persist {}: {}", dest.display(), e.error)))?;

        Ok(written)
    }

    fn classify(&self, e: reqwest::Error) -> ProvisionError {
        if e.is_timeout() {
            ProvisionError::Timeout {
                url: self.config.model_url.clone(),
                secs: self.config.fetch_timeout.as_secs(),
            }
        } else {
            ProvisionError::Network {
                url: self.config.model_url.clone(),
                reason: e.to_string(),
            }
        }
    }
}
