use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

const MAX_DETAIL_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to download audio: {0}")]
    DownloadFailure(String),

    #[error("Download timed out after {0} seconds")]
    DownloadTimeout(u64),

    #[error("Failed to chunk audio: {0}")]
    ChunkingFailure(String),

    #[error("Transcription service error: {0}")]
    ServiceFailure(String),

    #[error("Malformed segment in chunk {chunk}: {reason}")]
    MalformedSegment { chunk: usize, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Name of the pipeline stage that produced the error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Auth(_) => "auth",
            Self::Config(_) => "config",
            Self::DownloadFailure(_) => "download",
            Self::DownloadTimeout(_) => "download_timeout",
            Self::ChunkingFailure(_) => "chunking",
            Self::ServiceFailure(_) => "transcription",
            Self::MalformedSegment { .. } => "malformed_segment",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::DownloadTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Config(_)
            | Self::DownloadFailure(_)
            | Self::ChunkingFailure(_)
            | Self::ServiceFailure(_)
            | Self::MalformedSegment { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Cuts `message` to at most [`MAX_DETAIL_CHARS`] characters.
pub fn truncate_detail(message: &str) -> String {
    match message.char_indices().nth(MAX_DETAIL_CHARS) {
        Some((idx, _)) => format!("{}...", &message[..idx]),
        None => message.to_string(),
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("request failed at {} stage: {}", self.kind(), self);
        } else {
            log::warn!("request rejected ({}): {}", self.kind(), self);
        }

        let body = Json(ErrorResponse {
            detail: truncate_detail(&self.to_string()),
        });

        (status, body).into_response()
    }
}
