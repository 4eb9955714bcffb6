use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::workflow::{ErrorKind, WorkflowError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Workflow(e) => {
                let (status, code) = match e.kind() {
                    ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                    ErrorKind::Busy => (StatusCode::CONFLICT, "BUSY"),
                    ErrorKind::Cancelled => (StatusCode::CONFLICT, "CANCELLED"),
                    ErrorKind::InsufficientText => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_TEXT")
                    }
                    ErrorKind::PdfParse => (StatusCode::UNPROCESSABLE_ENTITY, "PDF_PARSE_ERROR"),
                    ErrorKind::EngineUnavailable => {
                        (StatusCode::SERVICE_UNAVAILABLE, "ENGINE_UNAVAILABLE")
                    }
                    ErrorKind::Transport => (StatusCode::BAD_GATEWAY, "TRANSPORT_ERROR"),
                    ErrorKind::RemoteOperation => (StatusCode::BAD_GATEWAY, "REMOTE_OPERATION_ERROR"),
                    ErrorKind::MalformedResponse => (StatusCode::BAD_GATEWAY, "MALFORMED_RESPONSE"),
                };
                if status.is_server_error() {
                    tracing::error!("Workflow error ({code}): {e}");
                }
                (status, code, e.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis_client::AnalysisError;
    use crate::extraction::ExtractError;
    use crate::workflow::errors::Step;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_workflow_status_mapping() {
        let cases = [
            (WorkflowError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (WorkflowError::Busy, StatusCode::CONFLICT),
            (
                ExtractError::UnsupportedFormat("image/png".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                ExtractError::InsufficientText { chars: 4 }.into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ExtractError::PdfParse("bad xref".into()).into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ExtractError::EngineUnavailable("warming up".into()).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                WorkflowError::analysis(Step::Scoring)(AnalysisError::Remote("no".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                WorkflowError::analysis(Step::Scoring)(AnalysisError::Transport("t".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(status_of(AppError::from(err)), expected);
        }
    }

    #[test]
    fn test_not_found_and_internal() {
        assert_eq!(
            status_of(AppError::NotFound("session".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Internal(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_message_is_not_leaked() {
        let (_, code, message) = AppError::Internal(anyhow::anyhow!("db password wrong")).parts();
        assert_eq!(code, "INTERNAL_ERROR");
        assert!(!message.contains("password"));
    }
}
