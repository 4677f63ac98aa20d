use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::validation::Issue;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid payload")]
    Validation(Vec<Issue>),
    #[error("unauthorized - invalid API key")]
    Unauthorized,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("not found")]
    NotFound,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// A single validation issue on `path`.
    pub fn invalid(path: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![Issue::new(path, message)])
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            AppError::Validation(issues) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid payload", "issues": issues }),
            ),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": message })),
            AppError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, json!({ "error": message }))
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": message })),
            AppError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, json!({ "error": message }))
            }
            AppError::Internal(e) => {
                // Details stay in the server log.
                error!(error = ?e, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_lists_issues() {
        let (status, body) = render(AppError::invalid("temperatura", "Required")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["issues"][0]["path"], "temperatura");
        assert_eq!(body["issues"][0]["message"], "Required");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let (status, body) = render(anyhow::anyhow!("connection refused").into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");
    }

    #[tokio::test]
    async fn status_only_errors() {
        assert_eq!(render(AppError::Unauthorized).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(
            render(AppError::MethodNotAllowed).await.0,
            StatusCode::METHOD_NOT_ALLOWED
        );
        let (status, body) = render(AppError::PayloadTooLarge).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "payload too large");
    }
}
