use serde::{Deserialize, Serialize};

/// Face embedding vector (4096-dimensional for VGG-Face, 512 for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute cosine distance `1 - cos(a, b)` between two embeddings.
    ///
    /// Returns a value in [0, 2]. Lower = more similar. A zero-norm operand
    /// yields the neutral distance 1.0 rather than NaN.
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            1.0 - dot / denom
        } else {
            1.0
        }
    }
}

/// One stored embedding a probe can be compared against.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub record_id: i64,
    pub embedding: Embedding,
}

/// Result of matching a probe embedding against a gallery.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub verified: bool,
    /// Cosine distance of the best candidate.
    pub distance: f32,
    /// Model-defined threshold the distance was compared against.
    pub threshold: f32,
    /// Record id of the best candidate (set only when verified).
    pub record_id: Option<i64>,
}

/// Strategy for comparing a probe embedding against stored embeddings.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry], threshold: f32) -> MatchResult;
}

/// Cosine-distance matcher.
///
/// Always traverses the whole gallery and keeps the lowest distance, so a
/// user with several registered faces verifies against the closest one.
/// The threshold comparison is inclusive: `distance == threshold` verifies.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry], threshold: f32) -> MatchResult {
        let mut best_distance = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, entry) in gallery.iter().enumerate() {
            let distance = probe.cosine_distance(&entry.embedding);
            if distance < best_distance {
                best_distance = distance;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_distance <= threshold => MatchResult {
                verified: true,
                distance: best_distance,
                threshold,
                record_id: Some(gallery[idx].record_id),
            },
            _ => MatchResult {
                verified: false,
                distance: best_distance,
                threshold,
                record_id: None,
            },
        }
    }
}
