//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Well-formed, but rejected by a domain rule (e.g. a future install date).
  #[error("unprocessable: {0}")]
  Unprocessable(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<purecare_core::Error> for ApiError {
  fn from(e: purecare_core::Error) -> Self {
    use purecare_core::Error as E;
    match e {
      E::FutureInstallDate { .. } | E::DateOutOfRange => ApiError::Unprocessable(e.to_string()),
      E::InvalidLifespan { .. } | E::UnknownSlot(_) | E::UnknownStatus(_) | E::UnknownUnit(_) => {
        ApiError::BadRequest(e.to_string())
      }
    }
  }
}

impl From<purecare_engine::Error> for ApiError {
  fn from(e: purecare_engine::Error) -> Self {
    use purecare_engine::Error as E;
    match e {
      E::Core(e) => e.into(),
      E::PurifierNotFound(id) => ApiError::NotFound(format!("purifier {id} not found")),
      E::Store(e) => ApiError::Store(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
