//! Face embedding extraction via ONNX Runtime.
//!
//! Crops the detected face region, resizes it to the recognition model's
//! input and runs inference, yielding an L2-normalized embedding of the
//! model's fixed dimensionality.

use crate::catalog::FaceModel;
use crate::detector::DetectedFace;
use crate::types::Embedding;
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

/// Margin added around the detected box before cropping, as a fraction of
/// the box size.
const CROP_MARGIN: f32 = 0.1;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ONNX-backed face recognizer for one model from the catalog.
pub struct FaceRecognizer {
    session: Session,
    model: FaceModel,
}

impl FaceRecognizer {
    /// Load the recognition ONNX model from the given path.
    pub fn load(model_path: &Path, model: FaceModel) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            model = model.name(),
            dimension = model.dimension(),
            "loaded recognition model"
        );

        Ok(Self { session, model })
    }

    /// Extract an embedding from a detected face in an RGB image.
    pub fn embed(
        &mut self,
        image: &RgbImage,
        face: &DetectedFace,
    ) -> Result<Embedding, RecognizerError> {
        let crop = crop_face(image, face);
        let input = preprocess(&crop, self.model);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            RecognizerError::InferenceFailed(format!("embedding extraction: {e}"))
        })?;

        let raw: Vec<f32> = raw_data.to_vec();

        let expected = self.model.dimension();
        if raw.len() != expected {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {expected}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding::new(l2_normalize(raw)))
    }
}

/// L2-normalize a raw model output. Cosine distance is unaffected but unit
/// vectors keep stored values in a predictable range.
fn l2_normalize(raw: Vec<f32>) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw
    }
}

/// Crop the detected box from the image with a small margin, clamped to the
/// image bounds. Always yields at least a 1x1 crop.
fn crop_face(image: &RgbImage, face: &DetectedFace) -> RgbImage {
    let (img_w, img_h) = image.dimensions();

    let margin_x = face.width * CROP_MARGIN;
    let margin_y = face.height * CROP_MARGIN;

    let x1 = ((face.x - margin_x).max(0.0) as u32).min(img_w - 1);
    let y1 = ((face.y - margin_y).max(0.0) as u32).min(img_h - 1);
    let x2 = ((face.x + face.width + margin_x).ceil().max(0.0) as u32).clamp(x1 + 1, img_w);
    let y2 = ((face.y + face.height + margin_y).ceil().max(0.0) as u32).clamp(y1 + 1, img_h);

    image::imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image()
}

/// Resize a face crop to the model input and pack it into a normalized NCHW
/// float tensor, channels in RGB order.
fn preprocess(face: &RgbImage, model: FaceModel) -> Array4<f32> {
    let size = model.input_size();
    let (mean, std) = model.normalization();

    let resized = image::imageops::resize(face, size, size, FilterType::Triangle);

    let size = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - mean) / std;
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_image(w: u32, h: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, image::Rgb([value, value, value]))
    }

    #[test]
    fn test_preprocess_output_shape() {
        let crop = uniform_image(64, 48, 128);
        for model in [FaceModel::VggFace, FaceModel::Facenet, FaceModel::ArcFace] {
            let size = model.input_size() as usize;
            let tensor = preprocess(&crop, model);
            assert_eq!(tensor.shape(), &[1, 3, size, size]);
        }
    }

    #[test]
    fn test_preprocess_normalization() {
        let crop = uniform_image(112, 112, 128);
        let tensor = preprocess(&crop, FaceModel::ArcFace);
        let (mean, std) = FaceModel::ArcFace.normalization();
        let expected = (128.0 - mean) / std;
        let val = tensor[[0, 0, 0, 0]];
        assert!((val - expected).abs() < 1e-6, "got {val}, expected {expected}");
    }

    #[test]
    fn test_preprocess_vgg_face_scales_to_unit_range() {
        let crop = uniform_image(224, 224, 255);
        let tensor = preprocess(&crop, FaceModel::VggFace);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_crop_face_clamps_to_image_bounds() {
        let img = uniform_image(100, 100, 10);
        let face = DetectedFace {
            x: 80.0,
            y: 80.0,
            width: 50.0,
            height: 50.0,
            confidence: 0.9,
        };
        let crop = crop_face(&img, &face);
        assert!(crop.width() <= 100);
        assert!(crop.height() <= 100);
        assert!(crop.width() > 0 && crop.height() > 0);
    }

    #[test]
    fn test_crop_face_negative_origin() {
        let img = uniform_image(100, 100, 10);
        let face = DetectedFace {
            x: -10.0,
            y: -5.0,
            width: 40.0,
            height: 40.0,
            confidence: 0.9,
        };
        let crop = crop_face(&img, &face);
        assert!(crop.width() > 0 && crop.height() > 0);
    }

    #[test]
    fn test_l2_normalize_unit_norm() {
        let normalized = l2_normalize(vec![3.0, 4.0]);
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        let normalized = l2_normalize(vec![0.0, 0.0, 0.0]);
        assert_eq!(normalized, vec![0.0, 0.0, 0.0]);
    }
}
