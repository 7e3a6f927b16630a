//! Embedding extraction contract and its ONNX-backed implementation.

use crate::catalog::FaceModel;
use crate::detector::{DetectorError, FaceDetector, DETECTOR_FILE};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::Embedding;
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("no face detected in the image")]
    NoFaceDetected,
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Opaque embedding capability: image in, fixed-length vector out.
///
/// `extract` fails with [`ExtractError::NoFaceDetected`] when the image
/// contains no recognizable face; any other fault propagates as the
/// underlying error. Implementations take `&mut self` because inference
/// sessions are stateful.
pub trait EmbeddingExtractor {
    fn extract(&mut self, image: &DynamicImage) -> Result<Embedding, ExtractError>;

    /// The catalog model this extractor produces embeddings for.
    fn model(&self) -> FaceModel;
}

/// ONNX-backed extractor: SCRFD detection, then crop-and-embed with the
/// configured recognition model. Both sessions load fail-fast.
pub struct OnnxExtractor {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    model: FaceModel,
}

impl OnnxExtractor {
    pub fn load(model_dir: &Path, model: FaceModel) -> Result<Self, ExtractError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(model.recognizer_file()), model)?;
        Ok(Self {
            detector,
            recognizer,
            model,
        })
    }
}

impl EmbeddingExtractor for OnnxExtractor {
    fn extract(&mut self, image: &DynamicImage) -> Result<Embedding, ExtractError> {
        let rgb = image.to_rgb8();

        let faces = self.detector.detect(&rgb)?;
        let best = faces.first().ok_or(ExtractError::NoFaceDetected)?;

        tracing::debug!(
            candidates = faces.len(),
            confidence = best.confidence,
            "face selected for embedding"
        );

        Ok(self.recognizer.embed(&rgb, best)?)
    }

    fn model(&self) -> FaceModel {
        self.model
    }
}
