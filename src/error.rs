use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure kinds the HTTP surface can report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Invalid request format")]
    InvalidRequestFormat,

    #[error("Invalid YouTube URL")]
    InvalidUrl,

    #[error("Video not found")]
    VideoNotFound,

    #[error("No captions available for this video")]
    NoCaptionsAvailable,

    #[error("Language not available")]
    LanguageUnavailable,

    #[error("Failed to fetch video info")]
    MetadataFetchFailed,

    #[error("{}", transcript_failure_message(.translated))]
    TranscriptFetchFailed { translated: bool },

    #[error("Internal server error")]
    InternalFailure,

    #[error("Too many requests, please try again later.")]
    RateLimited,

    #[error("endpoint not found")]
    EndpointNotFound,
}

fn transcript_failure_message(translated: &bool) -> &'static str {
    if *translated {
        "Failed to fetch transcript in the requested language. Please try again."
    } else {
        "Failed to fetch transcript. Please try again."
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequestFormat | ApiError::InvalidUrl | ApiError::LanguageUnavailable => {
                StatusCode::BAD_REQUEST
            }
            ApiError::VideoNotFound | ApiError::NoCaptionsAvailable | ApiError::EndpointNotFound => {
                StatusCode::NOT_FOUND
            }
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::MetadataFetchFailed | ApiError::TranscriptFetchFailed { .. } | ApiError::InternalFailure => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
