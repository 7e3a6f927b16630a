//! Registration and verification services.
//!
//! Both are stateless single-pass pipelines over the engine and the store:
//! register is extract-then-save, verify is fetch-extract-compare. Neither
//! retries, and neither leaves partial state behind on failure.

use crate::engine::{EngineError, EngineHandle};
use faceid_core::{CosineMatcher, Embedding, ExtractError, FaceModel, GalleryEntry, Matcher};
use faceid_store::{FaceStore, StorageError};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("no face detected in the image")]
    NoFaceDetected,
    #[error("extraction failed: {0}")]
    Extraction(EngineError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Extracts an embedding from the uploaded image and persists it.
#[derive(Clone)]
pub struct RegistrationService {
    engine: EngineHandle,
    store: FaceStore,
}

impl RegistrationService {
    pub fn new(engine: EngineHandle, store: FaceStore) -> Self {
        Self { engine, store }
    }

    /// Register one face for the user and return the new record id.
    ///
    /// `NoFaceDetected` propagates unchanged; a storage failure after a
    /// successful extraction persists nothing.
    pub async fn register(&self, image: DynamicImage, user_id: i64) -> Result<i64, RegisterError> {
        let embedding = self.engine.extract(image).await.map_err(|e| match e {
            EngineError::Extract(ExtractError::NoFaceDetected) => RegisterError::NoFaceDetected,
            other => RegisterError::Extraction(other),
        })?;

        let record_id = self.store.save(user_id, &embedding).await?;
        tracing::info!(record_id, user_id, "face registered");
        Ok(record_id)
    }
}

/// Outcome of verifying a probe image against a user's stored faces.
///
/// "Confirmed not the same person" and "could not evaluate" are distinct
/// variants so callers never have to guess which one an empty result meant.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    Matched {
        record_id: i64,
        user_id: i64,
        distance: f32,
        threshold: f32,
    },
    NotMatched {
        distance: f32,
        threshold: f32,
    },
    /// No record registered for the user; the matcher is never invoked.
    NotFound,
    /// The probe could not be evaluated (no face detected, or an
    /// extraction fault). Logged server-side.
    Indeterminate {
        reason: String,
    },
}

/// Compares a probe image against every stored record for a user.
#[derive(Clone)]
pub struct VerificationService {
    engine: EngineHandle,
    store: FaceStore,
    model: FaceModel,
}

impl VerificationService {
    pub fn new(engine: EngineHandle, store: FaceStore, model: FaceModel) -> Self {
        Self {
            engine,
            store,
            model,
        }
    }

    /// Verify the probe image against the user's gallery, best-of-N distance.
    ///
    /// Storage faults propagate; extraction faults fold into
    /// [`VerifyOutcome::Indeterminate`].
    pub async fn verify(
        &self,
        image: DynamicImage,
        user_id: i64,
    ) -> Result<VerifyOutcome, StorageError> {
        let records = self.store.find_by_user(user_id).await?;
        if records.is_empty() {
            tracing::info!(user_id, "no face record for user");
            return Ok(VerifyOutcome::NotFound);
        }

        let probe = match self.engine.extract(image).await {
            Ok(embedding) => embedding,
            Err(err) => {
                tracing::warn!(user_id, error = %err, "probe extraction failed");
                return Ok(VerifyOutcome::Indeterminate {
                    reason: err.to_string(),
                });
            }
        };

        let gallery: Vec<GalleryEntry> = records
            .into_iter()
            .map(|r| GalleryEntry {
                record_id: r.id,
                embedding: r.embedding,
            })
            .collect();

        Ok(decide(user_id, &probe, &gallery, self.model.threshold()))
    }
}

/// Pure decision step: lowest gallery distance against the model threshold.
fn decide(
    user_id: i64,
    probe: &Embedding,
    gallery: &[GalleryEntry],
    threshold: f32,
) -> VerifyOutcome {
    let result = CosineMatcher.compare(probe, gallery, threshold);
    match result.record_id {
        Some(record_id) if result.verified => VerifyOutcome::Matched {
            record_id,
            user_id,
            distance: result.distance,
            threshold: result.threshold,
        },
        _ => VerifyOutcome::NotMatched {
            distance: result.distance,
            threshold: result.threshold,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(record_id: i64, values: Vec<f32>) -> GalleryEntry {
        GalleryEntry {
            record_id,
            embedding: Embedding::new(values),
        }
    }

    #[test]
    fn test_decide_matched_near_zero_distance() {
        let probe = Embedding::new(vec![1.0, 0.0, 0.0]);
        let gallery = vec![entry(1, vec![1.0, 0.0, 0.0])];

        match decide(42, &probe, &gallery, 0.68) {
            VerifyOutcome::Matched {
                record_id,
                user_id,
                distance,
                threshold,
            } => {
                assert_eq!(record_id, 1);
                assert_eq!(user_id, 42);
                assert!(distance.abs() < 1e-6);
                assert!((threshold - 0.68).abs() < 1e-6);
            }
            other => panic!("expected Matched, got {other:?}"),
        }
    }

    #[test]
    fn test_decide_not_matched_keeps_distance() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![entry(1, vec![0.0, 1.0])];

        match decide(42, &probe, &gallery, 0.68) {
            VerifyOutcome::NotMatched {
                distance,
                threshold,
            } => {
                assert!((distance - 1.0).abs() < 1e-6);
                assert!((threshold - 0.68).abs() < 1e-6);
            }
            other => panic!("expected NotMatched, got {other:?}"),
        }
    }

    #[test]
    fn test_decide_best_of_many_records() {
        // Two registrations for one user; the closer one wins.
        let probe = Embedding::new(vec![1.0, 0.1, 0.0]);
        let gallery = vec![
            entry(1, vec![0.0, 1.0, 0.0]),
            entry(2, vec![1.0, 0.0, 0.0]),
        ];

        match decide(7, &probe, &gallery, 0.68) {
            VerifyOutcome::Matched { record_id, .. } => assert_eq!(record_id, 2),
            other => panic!("expected Matched, got {other:?}"),
        }
    }

    #[test]
    fn test_decide_threshold_boundary_inclusive() {
        // Orthogonal vectors: distance exactly 1.0.
        let probe = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![entry(1, vec![0.0, 1.0])];

        assert!(matches!(
            decide(1, &probe, &gallery, 1.0),
            VerifyOutcome::Matched { .. }
        ));
        assert!(matches!(
            decide(1, &probe, &gallery, 1.0 - 1e-6),
            VerifyOutcome::NotMatched { .. }
        ));
    }
}
