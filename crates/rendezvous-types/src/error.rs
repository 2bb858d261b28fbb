use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, machine-readable error codes sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidParameters,
    RoomFull,
    RoomNotFound,
    DatabaseError,
    ExternalServiceError,
    ServiceUnavailable,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidParameters => "INVALID_PARAMETERS",
            ErrorCode::RoomFull => "ROOM_FULL",
            ErrorCode::RoomNotFound => "ROOM_NOT_FOUND",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from repository operations (used by trait definitions in rendezvous-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Generic message reported for errors whose detail must not leak to clients.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Errors surfaced by the room, message, location and map-service layers.
#[derive(Debug, Error)]
pub enum MeetupError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("room already has two participants")]
    RoomFull,

    #[error("room not found")]
    RoomNotFound,

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("external service error ({status}): {message}")]
    ExternalService { status: u16, message: String },

    #[error("service temporarily unavailable")]
    ServiceUnavailable,

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl MeetupError {
    /// Shorthand for an `InvalidParameters` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        MeetupError::InvalidParameters(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            MeetupError::InvalidParameters(_) => ErrorCode::InvalidParameters,
            MeetupError::RoomFull => ErrorCode::RoomFull,
            MeetupError::RoomNotFound => ErrorCode::RoomNotFound,
            MeetupError::Storage(_) => ErrorCode::DatabaseError,
            MeetupError::ExternalService { .. } => ErrorCode::ExternalServiceError,
            MeetupError::ServiceUnavailable => ErrorCode::ServiceUnavailable,
            MeetupError::Unknown(_) => ErrorCode::UnknownError,
        }
    }

    /// Whether this error is an expected, handled condition.
    ///
    /// Non-operational errors are logged in full but reported generically.
    pub fn is_operational(&self) -> bool {
        !matches!(self, MeetupError::Unknown(_))
    }

    /// Message safe to hand to a client.
    pub fn public_message(&self) -> String {
        match self {
            MeetupError::Storage(_) => "A storage error occurred".to_string(),
            MeetupError::Unknown(_) => GENERIC_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// HTTP status code equivalent of this error.
    pub fn status_code(&self) -> u16 {
        match self {
            MeetupError::InvalidParameters(_) => 400,
            MeetupError::RoomFull => 409,
            MeetupError::RoomNotFound => 404,
            MeetupError::Storage(_) => 500,
            MeetupError::ExternalService { status, .. } => *status,
            MeetupError::ServiceUnavailable => 503,
            MeetupError::Unknown(_) => 500,
        }
    }
}
