// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection service: owns the model lifecycle for the HTTP layer
//!
//! The model is provisioned and loaded lazily on the first request that
//! needs it, then kept as a single read-only handle shared by every request.
//! A failed provision or load is not cached, so the next request retries.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::model::{
    DetectionResult, DetectorLoader, InferenceError, LoadError, ObjectDetector,
};
use super::provisioner::{ModelProvisioner, ProvisionError};

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Model provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
    #[error("Model load failed: {0}")]
    Load(#[from] LoadError),
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("Inference timed out after {0}s")]
    Timeout(u64),
}

pub struct DetectionService {
    provisioner: ModelProvisioner,
    loader: Arc<dyn DetectorLoader>,
    detector: RwLock<Option<Arc<dyn ObjectDetector>>>,
    /// Serialises provisioning so concurrent first requests download once
    init_lock: Mutex<()>,
    inference_timeout: Duration,
}

impl DetectionService {
    pub fn new(
        provisioner: ModelProvisioner,
        loader: Arc<dyn DetectorLoader>,
        inference_timeout: Duration,
    ) -> Self {
        Self {
            provisioner,
            loader,
            detector: RwLock::new(None),
            init_lock: Mutex::new(()),
            inference_timeout,
        }
    }

    pub async fn is_loaded(&self) -> bool {
        self.detector.read().await.is_some()
    }

    /// Name of the resident detector, if one is loaded
    pub async fn model_name(&self) -> Option<String> {
        self.detector
            .read()
            .await
            .as_ref()
            .map(|d| d.name().to_string())
    }

    /// Get the shared detector, provisioning and loading it on first use
    pub async fn detector(&self) -> Result<Arc<dyn ObjectDetector>, DetectionError> {
        if let Some(detector) = self.detector.read().await.as_ref() {
            return Ok(detector.clone());
        }

        let _guard = self.init_lock.lock().await;

        // Another request may have finished loading while we waited
        if let Some(detector) = self.detector.read().await.as_ref() {
            return Ok(detector.clone());
        }

        let model_path = self.provisioner.ensure_model_available().await?;
        let detector = self.load(model_path).await?;

        *self.detector.write().await = Some(detector.clone());
        info!("Detection model ready: {}", detector.name());

        Ok(detector)
    }

    async fn load(&self, model_path: PathBuf) -> Result<Arc<dyn ObjectDetector>, DetectionError> {
        let loader = self.loader.clone();
        let loaded = tokio::task::spawn_blocking(move || loader.load(&model_path))
            .await
            .map_err(|e| LoadError::InvalidModel {
                path: self.provisioner.model_path().display().to_string(),
                reason: format!("loader task failed: {e}"),
            })?;

        Ok(loaded?)
    }

    /// Run detection on a stored image under the configured timeout
    ///
    /// A timed-out blocking task is detached, not cancelled: it finishes in
    /// the background and holds the detector until then. Detectors bound how
    /// long later calls wait on it (see `YoloLoader::with_session_wait`).
    pub async fn detect(&self, image_path: PathBuf) -> Result<DetectionResult, DetectionError> {
        let detector = self.detector().await?;

        let task = tokio::task::spawn_blocking(move || detector.detect(&image_path));

        match tokio::time::timeout(self.inference_timeout, task).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(join_err)) => Err(InferenceError::Engine(format!(
                "detection task failed: {join_err}"
            ))
            .into()),
            Err(_) => {
                warn!(
                    "Detection exceeded {}s timeout",
                    self.inference_timeout.as_secs()
                );
                Err(DetectionError::Timeout(self.inference_timeout.as_secs()))
            }
        }
    }

    /// Try to have the model resident before the first request arrives
    ///
    /// Failure is logged and otherwise ignored; requests retry on demand.
    pub async fn warm_up(&self) {
        match self.detector().await {
            Ok(detector) => info!("✅ Detection model warmed up: {}", detector.name()),
            Err(e) => warn!("⚠️ Model warm-up failed, will retry on first upload: {}", e),
        }
    }
}
