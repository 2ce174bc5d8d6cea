use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

#[derive(Error, Debug)]
pub enum AppError {
    /// A required request field was absent or empty.
    #[error("{0}")]
    InputMissing(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// An external service (vision, generation) failed.
    #[error("Upstream error ({service}): {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn upstream(service: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::Upstream {
            service,
            message: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InputMissing(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Render(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-language message shown to the end user.
    fn public_message(&self) -> String {
        match self {
            AppError::InputMissing(msg) | AppError::InvalidTransition(msg) => msg.clone(),
            AppError::Upstream { service, .. } => {
                format!("The {service} service could not complete the request. Please try again.")
            }
            AppError::Render(msg) => format!("Could not create the document: {msg}"),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

fn get_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Upstream { service, message } => {
                tracing::error!(service = %service, error = %message, "Upstream error");
            }
            AppError::Render(msg) => tracing::error!(error = %msg, "Render error"),
            AppError::Internal(msg) => tracing::error!(error = %msg, "Internal error"),
            AppError::InputMissing(msg) | AppError::InvalidTransition(msg) => {
                tracing::warn!(error = %msg, "Rejected request");
            }
        }

        let status = self.status();
        let error_message = self.public_message();

        let body = if let Some(trace_id) = get_trace_id() {
            json!({
                "error": error_message,
                "status": status.as_u16(),
                "trace_id": trace_id,
            })
        } else {
            json!({
                "error": error_message,
                "status": status.as_u16(),
            })
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_missing_message_is_verbatim() {
        let error = AppError::InputMissing("No image uploaded".to_string());
        assert_eq!(error.to_string(), "No image uploaded");
        assert_eq!(error.public_message(), "No image uploaded");
    }

    #[test]
    fn test_upstream_hides_details_from_user() {
        let error = AppError::upstream("vision", "403 PERMISSION_DENIED: key revoked");
        assert_eq!(
            error.to_string(),
            "Upstream error (vision): 403 PERMISSION_DENIED: key revoked"
        );
        assert!(!error.public_message().contains("key revoked"));
    }

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (AppError::InputMissing("x".into()), StatusCode::BAD_REQUEST),
            (
                AppError::InvalidTransition("x".into()),
                StatusCode::CONFLICT,
            ),
            (AppError::upstream("generation", "x"), StatusCode::BAD_GATEWAY),
            (
                AppError::Render("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected_status) in test_cases {
            assert_eq!(error.status(), expected_status, "{error}");
        }
    }

    #[tokio::test]
    async fn test_into_response_has_error_key() {
        let response = AppError::InputMissing("No image uploaded".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "No image uploaded");
        assert_eq!(body["status"], 400);
    }
}
