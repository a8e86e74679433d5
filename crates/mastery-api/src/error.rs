//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use mastery_core::{EngineError, Error};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Rejected(#[from] Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl<E> From<EngineError<E>> for ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  fn from(err: EngineError<E>) -> Self {
    match err {
      EngineError::Rejected(e) => ApiError::Rejected(e),
      EngineError::Store(e) => ApiError::Store(Box::new(e)),
    }
  }
}

/// HTTP status for a domain rejection.
fn rejection_status(err: &Error) -> StatusCode {
  match err {
    Error::ModuleNotFound(_) | Error::QuizNotFound(_) => StatusCode::NOT_FOUND,
    Error::ModuleLocked { .. } => StatusCode::LOCKED,
    Error::PermissionDenied(_) => StatusCode::FORBIDDEN,
    Error::VersionConflict { .. }
    | Error::QuizAlreadyExists(_)
    | Error::StaleContent { .. } => StatusCode::CONFLICT,
    _ => StatusCode::BAD_REQUEST,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Rejected(e) => (rejection_status(e), e.to_string()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
