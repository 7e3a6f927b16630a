//! Recognition model catalog.
//!
//! Each model fixes the embedding dimensionality, the verification threshold
//! and the input preprocessing. The threshold is a property of the model, not
//! a caller-tunable knob.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("unknown face model: {0} (expected vgg-face, facenet or arcface)")]
pub struct UnknownModel(String);

/// Face recognition models the service can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceModel {
    /// VGG-Face, 4096-dimensional output. The reference model.
    VggFace,
    /// FaceNet, 128-dimensional output.
    Facenet,
    /// ArcFace (w600k_r50), 512-dimensional output.
    ArcFace,
}

impl FaceModel {
    pub fn name(&self) -> &'static str {
        match self {
            FaceModel::VggFace => "vgg-face",
            FaceModel::Facenet => "facenet",
            FaceModel::ArcFace => "arcface",
        }
    }

    /// Embedding dimensionality produced by the model. Every stored record
    /// must have exactly this length.
    pub fn dimension(&self) -> usize {
        match self {
            FaceModel::VggFace => 4096,
            FaceModel::Facenet => 128,
            FaceModel::ArcFace => 512,
        }
    }

    /// Cosine-distance verification threshold; `distance <= threshold`
    /// declares a match.
    pub fn threshold(&self) -> f32 {
        match self {
            FaceModel::VggFace => 0.68,
            FaceModel::Facenet => 0.40,
            FaceModel::ArcFace => 0.68,
        }
    }

    /// Side length of the square crop the recognizer expects.
    pub fn input_size(&self) -> u32 {
        match self {
            FaceModel::VggFace => 224,
            FaceModel::Facenet => 160,
            FaceModel::ArcFace => 112,
        }
    }

    /// Per-channel `(mean, std)` applied as `(pixel - mean) / std`.
    pub fn normalization(&self) -> (f32, f32) {
        match self {
            FaceModel::VggFace => (0.0, 255.0),
            FaceModel::Facenet => (127.5, 128.0),
            FaceModel::ArcFace => (127.5, 127.5),
        }
    }

    /// ONNX file name of the recognition model inside the model directory.
    pub fn recognizer_file(&self) -> &'static str {
        match self {
            FaceModel::VggFace => "vgg_face.onnx",
            FaceModel::Facenet => "facenet128.onnx",
            FaceModel::ArcFace => "w600k_r50.onnx",
        }
    }
}

impl fmt::Display for FaceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FaceModel {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vgg-face" | "vggface" | "vgg_face" => Ok(FaceModel::VggFace),
            "facenet" => Ok(FaceModel::Facenet),
            "arcface" => Ok(FaceModel::ArcFace),
            other => Err(UnknownModel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_model_dimension() {
        assert_eq!(FaceModel::VggFace.dimension(), 4096);
        assert_eq!(FaceModel::ArcFace.dimension(), 512);
        assert_eq!(FaceModel::Facenet.dimension(), 128);
    }

    #[test]
    fn test_thresholds_are_positive() {
        for model in [FaceModel::VggFace, FaceModel::Facenet, FaceModel::ArcFace] {
            assert!(model.threshold() > 0.0);
            assert!(model.threshold() < 2.0);
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("vgg-face".parse::<FaceModel>().unwrap(), FaceModel::VggFace);
        assert_eq!("VGG_Face".parse::<FaceModel>().unwrap(), FaceModel::VggFace);
        assert_eq!("arcface".parse::<FaceModel>().unwrap(), FaceModel::ArcFace);
        assert_eq!("facenet".parse::<FaceModel>().unwrap(), FaceModel::Facenet);
        assert!("resnet".parse::<FaceModel>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for model in [FaceModel::VggFace, FaceModel::Facenet, FaceModel::ArcFace] {
            assert_eq!(model.to_string().parse::<FaceModel>().unwrap(), model);
        }
    }
}
