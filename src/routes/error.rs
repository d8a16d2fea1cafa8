//! HTTP-facing error type: every failure becomes `{ "error": "..." }` with a status.

use axum::{
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::warn;

use crate::bank::BankError;
use crate::batch::BatchError;
use crate::domain::ParseError;
use crate::protocol::ErrorOut;
use crate::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),
  #[error("{0}")]
  NotFound(String),
  #[error("{0}")]
  Conflict(String),
  #[error("{0}")]
  BadGateway(String),
  #[error("{0}")]
  Unavailable(String),
  #[error("{0}")]
  Internal(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      warn!(target: "nvr_backend", %status, error = %self, "Request failed");
    }
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

impl From<ParseError> for ApiError {
  fn from(e: ParseError) -> Self { ApiError::BadRequest(e.to_string()) }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self { ApiError::BadRequest(e.body_text()) }
}

impl From<BatchError> for ApiError {
  fn from(e: BatchError) -> Self {
    match e {
      BatchError::InvalidCount { .. } => ApiError::BadRequest(e.to_string()),
      other => ApiError::BadGateway(format!(
        "Failed to generate questions. The model may be busy, please try again. ({other})"
      )),
    }
  }
}

impl From<RepositoryError> for ApiError {
  fn from(e: RepositoryError) -> Self {
    match e {
      RepositoryError::NothingToExport => ApiError::NotFound(e.to_string()),
      RepositoryError::InvalidJson(_) | RepositoryError::InvalidFormat(_) => ApiError::BadRequest(e.to_string()),
      RepositoryError::Serialize(_) => ApiError::Internal(e.to_string()),
    }
  }
}

impl From<BankError> for ApiError {
  fn from(e: BankError) -> Self {
    match e {
      BankError::Missing { .. } => ApiError::NotFound(e.to_string()),
      other => ApiError::Internal(other.to_string()),
    }
  }
}
