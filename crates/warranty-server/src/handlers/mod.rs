pub mod admin;
pub mod patient;

use axum::{
  http::{HeaderValue, header},
  response::Response,
};

/// Append a `Set-Cookie` header to `res`.
pub(super) fn with_cookie(mut res: Response, cookie: Option<HeaderValue>) -> Response {
  if let Some(value) = cookie {
    res.headers_mut().append(header::SET_COOKIE, value);
  }
  res
}
