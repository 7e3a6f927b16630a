//! HTTP surface.
//!
//! Two multipart endpoints over the services, plus a welcome route. Uploaded
//! images are decoded in memory; nothing touches the filesystem, so there is
//! no temp file to clean up on any exit path.

use crate::service::{RegisterError, RegistrationService, VerificationService, VerifyOutcome};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use image::DynamicImage;
use serde::Serialize;

#[derive(Clone)]
pub struct AppState {
    pub registration: RegistrationService,
    pub verification: VerificationService,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/register_face", post(register_face))
        .route("/find_similar_faces", post(find_similar_faces))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Client-visible request failure.
enum ApiError {
    BadRequest(String),
    NoFaceDetected,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NoFaceDetected => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "no face detected in the image".to_string(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Decoded multipart upload: one image file plus an integer user id.
struct FaceUpload {
    image: DynamicImage,
    user_id: i64,
}

impl FaceUpload {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut image_bytes = None;
        let mut user_id = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
        {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("image") => {
                    image_bytes = Some(field.bytes().await.map_err(|e| {
                        ApiError::BadRequest(format!("could not read image field: {e}"))
                    })?);
                }
                Some("user_id") => {
                    let text = field.text().await.map_err(|e| {
                        ApiError::BadRequest(format!("could not read user_id field: {e}"))
                    })?;
                    user_id = Some(text.trim().parse().map_err(|_| {
                        ApiError::BadRequest(format!("user_id must be an integer, got {text:?}"))
                    })?);
                }
                _ => {}
            }
        }

        let bytes = image_bytes
            .ok_or_else(|| ApiError::BadRequest("missing \"image\" field".to_string()))?;
        let user_id =
            user_id.ok_or_else(|| ApiError::BadRequest("missing \"user_id\" field".to_string()))?;

        let image = image::load_from_memory(&bytes)
            .map_err(|e| ApiError::BadRequest(format!("could not decode image: {e}")))?;

        Ok(Self { image, user_id })
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Welcome to the Face-ID API" }))
}

#[derive(Serialize)]
struct RegisterResponse {
    record_id: i64,
}

async fn register_face(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = FaceUpload::from_multipart(multipart).await?;

    let record_id = state
        .registration
        .register(upload.image, upload.user_id)
        .await
        .map_err(|e| match e {
            RegisterError::NoFaceDetected => ApiError::NoFaceDetected,
            other => ApiError::Internal(other.to_string()),
        })?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { record_id })))
}

#[derive(Serialize)]
struct MatchBody {
    record_id: i64,
    user_id: i64,
    distance: f32,
    threshold: f32,
}

/// Wire shape of a verification outcome. `match` is null for every outcome
/// except a positive verification.
#[derive(Serialize)]
struct VerifyResponse {
    status: &'static str,
    #[serde(rename = "match")]
    matched: Option<MatchBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl From<VerifyOutcome> for VerifyResponse {
    fn from(outcome: VerifyOutcome) -> Self {
        match outcome {
            VerifyOutcome::Matched {
                record_id,
                user_id,
                distance,
                threshold,
            } => VerifyResponse {
                status: "matched",
                matched: Some(MatchBody {
                    record_id,
                    user_id,
                    distance,
                    threshold,
                }),
                distance: None,
                threshold: None,
                reason: None,
            },
            VerifyOutcome::NotMatched {
                distance,
                threshold,
            } => VerifyResponse {
                status: "not_matched",
                matched: None,
                distance: Some(distance),
                threshold: Some(threshold),
                reason: None,
            },
            VerifyOutcome::NotFound => VerifyResponse {
                status: "not_found",
                matched: None,
                distance: None,
                threshold: None,
                reason: None,
            },
            VerifyOutcome::Indeterminate { reason } => VerifyResponse {
                status: "indeterminate",
                matched: None,
                distance: None,
                threshold: None,
                reason: Some(reason),
            },
        }
    }
}

async fn find_similar_faces(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<VerifyResponse>, ApiError> {
    let upload = FaceUpload::from_multipart(multipart).await?;

    let outcome = state
        .verification
        .verify(upload.image, upload.user_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(VerifyResponse::from(outcome)))
}
