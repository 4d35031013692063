use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::render::RenderError;

/// Failures that abort a batch. Remote-service trouble never shows up here;
/// it is absorbed into degraded outcomes.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),
    #[error("failed to prepare batch directory: {0}")]
    BatchDir(#[source] std::io::Error),
    #[error("failed to write image: {0}")]
    Render(#[from] RenderError),
    #[error("failed to serialize metadata: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("failed to write metadata: {0}")]
    MetadataWrite(#[source] std::io::Error),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Errors surfaced at the HTTP boundary as plain-text responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidForm(String),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to read archive: {0}")]
    ReadArchive(#[source] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidForm(detail) => {
                tracing::info!("Rejected form: {}", detail);
                (StatusCode::UNPROCESSABLE_ENTITY, detail).into_response()
            }
            ApiError::Multipart(err) => {
                tracing::info!("Malformed multipart body: {}", err);
                (err.status(), err.body_text()).into_response()
            }
            other => {
                tracing::error!("Internal server error: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
            }
        }
    }
}
