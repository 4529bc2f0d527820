use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use cosmetics_db::{DbError, StoreErrorKind};
use serde::Serialize;

/// API error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: String,
}

impl ErrorResponse {
  pub fn new(error: impl Into<String>) -> Self {
    Self {
      error: error.into(),
    }
  }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
  DatabaseError(DbError),
  ValidationError(String),
  SerializationError(serde_json::Error),
  /// A request that names something that doesn't exist
  NotFound(&'static str),
  /// A well-formed request the store refused (duplicate, unknown reference)
  Rejected(&'static str),
  Unauthorized,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      AppError::DatabaseError(db_err) => match db_err.kind() {
        StoreErrorKind::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        StoreErrorKind::UniqueViolation => (StatusCode::BAD_REQUEST, "Already exists".to_string()),
        StoreErrorKind::ForeignKeyViolation => (
          StatusCode::BAD_REQUEST,
          "Referenced entry does not exist".to_string(),
        ),
        StoreErrorKind::Other => {
          // Don't expose internal database errors
          tracing::error!(?db_err, "Internal database error");
          (
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred. Please try again later.".to_string(),
          )
        }
      },
      AppError::SerializationError(err) => {
        tracing::error!(%err, "Failed to serialize response");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          "An internal error occurred. Please try again later.".to_string(),
        )
      }
      AppError::ValidationError(msg) => {
        tracing::warn!(validation_error = %msg, "Validation failed");
        (StatusCode::BAD_REQUEST, msg)
      }
      AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.to_string()),
      AppError::Rejected(msg) => {
        tracing::debug!(reason = msg, "Request rejected by store");
        (StatusCode::BAD_REQUEST, msg.to_string())
      }
      AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Missing or invalid API token".to_string()),
    };

    (status, Json(ErrorResponse::new(message))).into_response()
  }
}

impl From<DbError> for AppError {
  fn from(err: DbError) -> Self {
    AppError::DatabaseError(err)
  }
}

impl From<serde_json::Error> for AppError {
  fn from(err: serde_json::Error) -> Self {
    AppError::SerializationError(err)
  }
}

impl From<crate::validation::ValidationError> for AppError {
  fn from(err: crate::validation::ValidationError) -> Self {
    AppError::ValidationError(err.to_string())
  }
}
