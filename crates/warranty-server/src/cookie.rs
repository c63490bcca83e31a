//! The `warranty_step` binding cookie.

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::Utc;
use warranty_seal::BindingToken;

pub const BINDING_COOKIE: &str = "warranty_step";

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const EPOCH: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// `Set-Cookie` value carrying `token` until it expires.
pub fn issue(token: &BindingToken, secure: bool) -> Option<HeaderValue> {
  let max_age = (token.expires_at - Utc::now()).num_seconds().max(0);
  let value = format!(
    "{BINDING_COOKIE}={}; Path=/; Expires={}; Max-Age={max_age}; HttpOnly; {}",
    token.value,
    token.expires_at.format(HTTP_DATE),
    attributes(secure),
  );
  HeaderValue::from_str(&value).ok()
}

/// `Set-Cookie` value that removes the cookie.
pub fn clear(secure: bool) -> HeaderValue {
  let value = format!(
    "{BINDING_COOKIE}=; Path=/; Expires={EPOCH}; Max-Age=0; HttpOnly; {}",
    attributes(secure),
  );
  HeaderValue::from_str(&value)
    .unwrap_or_else(|_| HeaderValue::from_static("warranty_step=; Max-Age=0"))
}

// Browsers refuse `SameSite=None` without `Secure`; plain-HTTP development
// falls back to `Lax`.
fn attributes(secure: bool) -> &'static str {
  if secure { "SameSite=None; Secure" } else { "SameSite=Lax" }
}

/// The binding token presented with the request, if any.
pub fn binding_token(headers: &HeaderMap) -> Option<String> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(name, value)| *name == BINDING_COOKIE && !value.is_empty())
    .map(|(_, value)| value.to_owned())
}
