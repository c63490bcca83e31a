//! Error types and axum `IntoResponse` implementation.
//!
//! Patient-facing failures carry a stable `code` so the UI can pick the right
//! message. Binding-token failures answer a bare 403, and internal failures
//! never echo their cause.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use warranty_core::Error as CoreError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error(transparent)]
  Core(#[from] CoreError),
}

fn body(status: StatusCode, code: &str, message: String) -> Response {
  (status, Json(json!({ "error": message, "code": code }))).into_response()
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let e = match self {
      Error::Unauthorized => {
        let mut res =
          (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"warranty\""),
        );
        return res;
      }
      Error::Core(e) => e,
    };

    let message = e.to_string();
    match e {
      CoreError::RecordNotFound(_) | CoreError::ProductNotFound(_) => {
        body(StatusCode::NOT_FOUND, "not_found", message)
      }

      CoreError::Validation(fields) => (
        StatusCode::BAD_REQUEST,
        Json(json!({
          "error": "validation failed",
          "code": "validation",
          "fields": fields,
        })),
      )
        .into_response(),
      CoreError::BadRequest(_) => body(StatusCode::BAD_REQUEST, "bad_request", message),
      CoreError::SerialFormat(_) => body(StatusCode::BAD_REQUEST, "serial_format", message),
      CoreError::SerialNotFound(_) => {
        body(StatusCode::BAD_REQUEST, "serial_not_found", message)
      }
      CoreError::ProductInactive(_) => {
        body(StatusCode::BAD_REQUEST, "product_inactive", message)
      }
      CoreError::DuplicateSerial => {
        body(StatusCode::BAD_REQUEST, "duplicate_serial", message)
      }
      CoreError::SurgeryInFuture => {
        body(StatusCode::BAD_REQUEST, "surgery_in_future", message)
      }

      CoreError::SerialInUse(_) => body(StatusCode::CONFLICT, "serial_in_use", message),
      CoreError::AlreadyFilled => body(StatusCode::CONFLICT, "already_filled", message),
      CoreError::CannotBeFilled => body(StatusCode::CONFLICT, "cannot_be_filled", message),
      CoreError::CannotBeConfirmed => {
        body(StatusCode::CONFLICT, "cannot_be_confirmed", message)
      }

      CoreError::Forbidden => StatusCode::FORBIDDEN.into_response(),

      CoreError::Notify(e) => {
        tracing::error!(error = %e, "notification delivery failed");
        body(StatusCode::BAD_GATEWAY, "notify_failed", "email delivery failed".into())
      }
      CoreError::Seal(_) | CoreError::Store(_) => {
        tracing::error!(error = %message, "internal error");
        body(
          StatusCode::INTERNAL_SERVER_ERROR,
          "internal",
          "internal server error".into(),
        )
      }
    }
  }
}
