// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOv8 ONNX detection model
//!
//! Runs an ultralytics YOLOv8 ONNX export on CPU through ONNX Runtime and
//! decodes its `[1, 4 + classes, candidates]` output into detections.

use ndarray::{Axis, Ix2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::image_utils::decode_image_bytes;
use super::model::{
    DetectionResult, DetectorLoader, InferenceError, LoadError, ObjectDetector,
};
use super::postprocessing::{decode_predictions, PostprocessConfig};
use super::preprocessing::{preprocess_for_detection, YOLO_INPUT_SIZE};

/// Default upper bound on waiting for a session held by another request
pub const DEFAULT_SESSION_WAIT: Duration = Duration::from_secs(30);

const SESSION_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Loader producing [`YoloDetector`] instances with fixed thresholds
#[derive(Debug, Clone)]
pub struct YoloLoader {
    pub postprocess: PostprocessConfig,
    pub intra_threads: usize,
    pub session_wait: Duration,
}

impl YoloLoader {
    pub fn new(postprocess: PostprocessConfig) -> Self {
        Self {
            postprocess,
            intra_threads: 4,
            session_wait: DEFAULT_SESSION_WAIT,
        }
    }

    pub fn with_session_wait(mut self, session_wait: Duration) -> Self {
        self.session_wait = session_wait;
        self
    }
}

impl DetectorLoader for YoloLoader {
    fn load(&self, model_path: &Path) -> Result<Arc<dyn ObjectDetector>, LoadError> {
        let detector = YoloDetector::load(model_path, self.postprocess, self.intra_threads)?
            .with_session_wait(self.session_wait);
        Ok(Arc::new(detector))
    }
}

/// YOLOv8 detector backed by an ONNX Runtime session
pub struct YoloDetector {
    /// ONNX Runtime session; `run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    input_size: u32,
    postprocess: PostprocessConfig,
    model_name: String,
    /// How long `detect` waits for a session still held by an earlier run
    session_wait: Duration,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("model_name", &self.model_name)
            .field("input_name", &self.input_name)
            .field("input_size", &self.input_size)
            .field("postprocess", &self.postprocess)
            .field("session_wait", &self.session_wait)
            .finish_non_exhaustive()
    }
}

impl YoloDetector {
    /// Load a YOLOv8 ONNX export from disk
    ///
    /// # Errors
    /// - `LoadError::NotFound` if the file does not exist
    /// - `LoadError::InvalidModel` if ONNX Runtime rejects the file or the
    ///   graph has no inputs or outputs
    pub fn load(
        model_path: &Path,
        postprocess: PostprocessConfig,
        intra_threads: usize,
    ) -> Result<Self, LoadError> {
        if !model_path.exists() {
            return Err(LoadError::NotFound(model_path.display().to_string()));
        }

        let invalid = |reason: String| LoadError::InvalidModel {
            path: model_path.display().to_string(),
            reason,
        };

        info!("Loading detection model from {}", model_path.display());

        // CPU-only execution
        let session = Session::builder()
            .map_err(|e| invalid(format!("failed to create session builder: {e}")))?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| invalid(format!("failed to set CPU execution provider: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| invalid(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| invalid(format!("failed to set intra threads: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| invalid(e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| invalid("model has no inputs".to_string()))?;

        if session.outputs.is_empty() {
            return Err(invalid("model has no outputs".to_string()));
        }

        let model_name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yolo".to_string());

        debug!("Detection model input: {}, outputs: {}", input_name, session.outputs.len());
        info!("✅ Detection model {} loaded (CPU-only)", model_name);

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            input_size: YOLO_INPUT_SIZE,
            postprocess,
            model_name,
            session_wait: DEFAULT_SESSION_WAIT,
        })
    }

    pub fn with_session_wait(mut self, session_wait: Duration) -> Self {
        self.session_wait = session_wait;
        self
    }

    fn run(&self, image: &image::DynamicImage) -> Result<DetectionResult, InferenceError> {
        let (width, height) = (image.width(), image.height());
        let (input, letterbox) = preprocess_for_detection(image, self.input_size);

        let input_value =
            Value::from_array(input).map_err(|e| InferenceError::Engine(e.to_string()))?;

        let mut session = lock_within(&self.session, self.session_wait)?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| InferenceError::Engine(format!("inference failed: {e}")))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| InferenceError::Engine(format!("failed to extract output: {e}")))?;

        let shape = output.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(InferenceError::Engine(format!(
                "unexpected output shape {:?}, expected [1, 4 + classes, candidates]",
                shape
            )));
        }

        let mut predictions = output
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|e| InferenceError::Engine(e.to_string()))?;

        // Some exports emit [candidates, 4 + classes]
        if predictions.nrows() > predictions.ncols() {
            predictions = predictions.reversed_axes();
        }

        let detections =
            decode_predictions(predictions, &letterbox, width, height, &self.postprocess);

        Ok(DetectionResult {
            detections,
            image_width: width,
            image_height: height,
        })
    }
}

impl ObjectDetector for YoloDetector {
    fn detect(&self, image_path: &Path) -> Result<DetectionResult, InferenceError> {
        let start = Instant::now();

        let bytes = std::fs::read(image_path).map_err(|e| InferenceError::ImageRead {
            path: image_path.display().to_string(),
            reason: e.to_string(),
        })?;

        let (image, info) =
            decode_image_bytes(&bytes).map_err(|e| InferenceError::ImageDecode(e.to_string()))?;

        debug!(
            "Decoded image: {}x{}, {} bytes",
            info.width, info.height, info.size_bytes
        );

        let result = self.run(&image)?;

        info!(
            "Detection complete: {} objects in {}ms",
            result.len(),
            start.elapsed().as_millis()
        );

        Ok(result)
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// Take the session lock, failing once `wait` elapses
///
/// A run that outlives its request timeout keeps the lock; later requests
/// give up here instead of parking blocking threads indefinitely.
fn lock_within<T>(mutex: &Mutex<T>, wait: Duration) -> Result<MutexGuard<'_, T>, InferenceError> {
    let deadline = Instant::now() + wait;
    loop {
        match mutex.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(_)) => {
                return Err(InferenceError::Engine(
                    "detection session lock poisoned".to_string(),
                ))
            }
            Err(TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    return Err(InferenceError::Engine(format!(
                        "detection session busy for more than {}ms",
                        wait.as_millis()
                    )));
                }
                std::thread::sleep(SESSION_POLL_INTERVAL);
            }
        }
    }
}
