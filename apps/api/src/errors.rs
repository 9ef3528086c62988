use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::interview::store::StoreError;
use crate::llm_client::LlmError;
use crate::voice::VoiceError;

/// Errors surfaced by the Interview Session Controller.
///
/// Evaluation failures never show up here: they degrade to a fallback report.
#[derive(Debug, Error)]
pub enum InterviewError {
    #[error("Unsupported interview domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid interview configuration: {0}")]
    Configuration(String),

    #[error("Generation service error: {0}")]
    Generation(#[from] LlmError),

    #[error("Interview is already completed")]
    Completed,

    #[error("Interview has not been initialized")]
    NotInitialized,
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<InterviewError> for AppError {
    fn from(err: InterviewError) -> Self {
        match err {
            InterviewError::InvalidDomain(_) | InterviewError::Configuration(_) => {
                AppError::Validation(err.to_string())
            }
            InterviewError::Generation(e) => AppError::Llm(e.to_string()),
            InterviewError::Completed => AppError::Conflict(err.to_string()),
            InterviewError::NotInitialized => AppError::NotFound(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "The interviewer is unavailable right now. Please resubmit your answer."
                        .to_string(),
                )
            }
            AppError::Store(e) => {
                tracing::error!("Session store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "A session storage error occurred".to_string(),
                )
            }
            AppError::Voice(VoiceError::Synthesis(e)) => {
                tracing::warn!("Speech synthesis error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "SYNTHESIS_ERROR",
                    "Speech could not be synthesized".to_string(),
                )
            }
            AppError::Voice(e) => {
                tracing::warn!("Transcription error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "TRANSCRIPTION_ERROR",
                    "Audio could not be transcribed".to_string(),
                )
            }
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
