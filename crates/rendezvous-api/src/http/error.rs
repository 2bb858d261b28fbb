//! Application error type mapping to HTTP status codes and the error envelope.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use rendezvous_types::error::MeetupError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Domain errors from the core services.
    Meetup(MeetupError),
    /// No route matched the request.
    RouteNotFound(String),
}

impl From<MeetupError> for AppError {
    fn from(e: MeetupError) -> Self {
        AppError::Meetup(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::invalid(format!("invalid JSON body: {}", rejection.body_text()))
    }
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::Meetup(MeetupError::invalid(message))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Meetup(e) => {
                if e.is_operational() {
                    tracing::warn!(code = %e.code(), error = %e, "request failed");
                } else {
                    tracing::error!(error = ?e, "unexpected error while handling request");
                }
                let status = StatusCode::from_u16(e.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, e.code().as_str(), e.public_message())
            }
            AppError::RouteNotFound(path) => (
                StatusCode::NOT_FOUND,
                "ROUTE_NOT_FOUND",
                format!("Route {path} not found"),
            ),
        };

        let body = json!({
            "status": "error",
            "error": {
                "code": code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
