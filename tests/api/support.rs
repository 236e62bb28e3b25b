// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Shared helpers for HTTP-level tests
//!
//! Builds a router around a temporary upload directory with either an
//! injected detector (model file pre-created, no network) or an unreachable
//! model source.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use object_detect_node::{
    api::http_server::{create_app, AppState},
    detection::{
        Detection, DetectionResult, DetectionService, DetectorLoader, InferenceError, LoadError,
        ModelProvisioner, ObjectDetector, PostprocessConfig, ProvisionerConfig, YoloLoader,
    },
    storage::UploadStore,
};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const BOUNDARY: &str = "----object-detect-test-boundary";
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub upload_dir: PathBuf,
    pub model_dir: PathBuf,
    // Keeps the directory alive for the test's duration
    pub dir: TempDir,
}

/// Detector that finds nothing
pub struct EmptyDetector;

impl ObjectDetector for EmptyDetector {
    fn detect(&self, image_path: &Path) -> Result<DetectionResult, InferenceError> {
        let (width, height) = image_size(image_path)?;
        Ok(DetectionResult::empty(width, height))
    }

    fn name(&self) -> &str {
        "empty"
    }
}

/// Detector that reports one box covering the whole image
pub struct WholeImageDetector;

impl ObjectDetector for WholeImageDetector {
    fn detect(&self, image_path: &Path) -> Result<DetectionResult, InferenceError> {
        let (width, height) = image_size(image_path)?;
        Ok(DetectionResult {
            detections: vec![Detection {
                bbox: [0.0, 0.0, width as f32, height as f32],
                class_id: 0,
                confidence: 0.9,
            }],
            image_width: width,
            image_height: height,
        })
    }

    fn name(&self) -> &str {
        "whole-image"
    }
}

fn image_size(path: &Path) -> Result<(u32, u32), InferenceError> {
    let bytes = std::fs::read(path).map_err(|e| InferenceError::ImageRead {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let (_, info) = object_detect_node::detection::decode_image_bytes(&bytes)
        .map_err(|e| InferenceError::ImageDecode(e.to_string()))?;
    Ok((info.width, info.height))
}

struct StaticLoader(Arc<dyn ObjectDetector>);

impl DetectorLoader for StaticLoader {
    fn load(&self, _model_path: &Path) -> Result<Arc<dyn ObjectDetector>, LoadError> {
        Ok(self.0.clone())
    }
}

fn build(
    dir: TempDir,
    model_url: &str,
    loader: Arc<dyn DetectorLoader>,
    max_upload_bytes: usize,
) -> TestApp {
    let upload_dir = dir.path().join("uploads");
    let model_dir = dir.path().join("models");

    let provisioner = ModelProvisioner::new(ProvisionerConfig {
        model_path: model_dir.join("yolov8n.onnx"),
        model_url: model_url.to_string(),
        fetch_timeout: Duration::from_secs(5),
        expected_sha256: None,
    })
    .unwrap();

    let state = AppState {
        detection: Arc::new(DetectionService::new(
            provisioner,
            loader,
            Duration::from_secs(10),
        )),
        uploads: Arc::new(UploadStore::new(&upload_dir)),
    };

    TestApp {
        app: create_app(state.clone(), max_upload_bytes),
        state,
        upload_dir,
        model_dir,
        dir,
    }
}

/// App whose model artifact already exists and whose loader yields `detector`
pub fn app_with_detector(detector: Arc<dyn ObjectDetector>) -> TestApp {
    app_with_detector_and_limit(detector, MAX_UPLOAD_BYTES)
}

pub fn app_with_detector_and_limit(
    detector: Arc<dyn ObjectDetector>,
    max_upload_bytes: usize,
) -> TestApp {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("models")).unwrap();
    std::fs::write(dir.path().join("models").join("yolov8n.onnx"), b"weights").unwrap();

    build(
        dir,
        "http://127.0.0.1:1/never-fetched.onnx",
        Arc::new(StaticLoader(detector)),
        max_upload_bytes,
    )
}

/// App with no model on disk and a source nobody listens on
pub fn app_with_unreachable_model() -> TestApp {
    let dir = TempDir::new().unwrap();
    build(
        dir,
        "http://127.0.0.1:1/yolov8n.onnx",
        Arc::new(YoloLoader::new(PostprocessConfig::default())),
        MAX_UPLOAD_BYTES,
    )
}

/// Encode a solid-colour PNG
pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Hand-built multipart body with a single part
///
/// `filename: None` omits the filename attribute entirely.
pub fn multipart_body(field: &str, filename: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    match filename {
        Some(name) => body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, name
            )
            .as_bytes(),
        ),
        None => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n", field).as_bytes(),
        ),
    }
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(field: &str, filename: Option<&str>, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(field, filename, data)))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}
