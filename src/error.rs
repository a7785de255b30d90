//! API error type and its axum `IntoResponse` implementation.
//!
//! Error bodies are `{"detail": "..."}` — the shape the front-end's error
//! handler reads.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

use crate::audio::AudioError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),
  #[error("User not found. Please login first.")]
  UnknownUser,
  #[error("Audio conversion failed: {0}")]
  Conversion(#[from] AudioError),
  #[error("Storage error: {0}")]
  Store(#[from] StoreError),
  #[error("Error processing upload: {0}")]
  Upload(String),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::UnknownUser => StatusCode::NOT_FOUND,
      ApiError::Conversion(_) | ApiError::Store(_) | ApiError::Upload(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(json!({ "detail": self.to_string() }))).into_response()
  }
}
