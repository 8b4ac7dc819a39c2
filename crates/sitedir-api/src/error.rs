//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use sitedir_core::ErrorKind;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// The request carried no caller identity.
  #[error("missing caller identity")]
  Unauthenticated,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Domain(#[from] sitedir_core::Error),
}

impl ApiError {
  fn status_and_kind(&self) -> (StatusCode, &'static str) {
    match self {
      ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
      ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "authorization"),
      ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation"),
      ApiError::Domain(e) => match e.kind() {
        ErrorKind::Validation => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "conflict"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        ErrorKind::Authorization => (StatusCode::FORBIDDEN, "authorization"),
        ErrorKind::DependencyUnavailable => {
          (StatusCode::SERVICE_UNAVAILABLE, "dependency_unavailable")
        }
        ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, kind) = self.status_and_kind();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string(), "kind": kind }))).into_response()
  }
}
