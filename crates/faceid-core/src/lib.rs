//! faceid-core — face embedding extraction and matching.
//!
//! SCRFD face detection plus a configurable recognition model, both running
//! via ONNX Runtime for CPU inference; cosine-distance matching of a probe
//! embedding against stored embeddings.

pub mod catalog;
pub mod detector;
pub mod extractor;
pub mod recognizer;
pub mod types;

pub use catalog::FaceModel;
pub use extractor::{EmbeddingExtractor, ExtractError, OnnxExtractor};
pub use types::{CosineMatcher, Embedding, GalleryEntry, MatchResult, Matcher};
