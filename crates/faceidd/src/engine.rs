//! Extraction engine thread.
//!
//! ONNX sessions are stateful (`&mut self`), so detector and recognizer live
//! on one dedicated OS thread. HTTP handlers talk to it through a bounded
//! request channel with oneshot replies.

use faceid_core::{Embedding, EmbeddingExtractor, ExtractError, FaceModel, OnnxExtractor};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("engine thread exited")]
    ChannelClosed,
}

enum EngineRequest {
    Extract {
        image: DynamicImage,
        reply: oneshot::Sender<Result<Embedding, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Extract an embedding from the image on the engine thread.
    pub async fn extract(&self, image: DynamicImage) -> Result<Embedding, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Extract {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the extraction engine on a dedicated OS thread.
///
/// Loads both ONNX models synchronously before returning, so a missing or
/// broken model file fails startup instead of the first request.
pub fn spawn_engine(model_dir: &Path, model: FaceModel) -> Result<EngineHandle, EngineError> {
    let mut extractor = OnnxExtractor::load(model_dir, model)?;
    tracing::info!(
        dir = %model_dir.display(),
        model = model.name(),
        dimension = model.dimension(),
        "extractor loaded"
    );

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("faceid-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Extract { image, reply } => {
                        let result = extractor.extract(&image).map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}
