//! Device-binding tokens.
//!
//! A token seals the claim `"{record_id}-{step}"` together with an expiry
//! instant. The patient's browser keeps it in a cookie; each later step must
//! present a token whose claim names the same record and one of the steps that
//! step accepts. There is no server-side session table.

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::{Result, SealKey};

const BINDING_AAD: &[u8] = b"warranty-binding";

/// Registrations may be resumed long after they start.
pub const DEFAULT_TTL_DAYS: i64 = 365;

/// An issued token and the instant it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingToken {
  pub value:      String,
  pub expires_at: DateTime<Utc>,
}

/// Issues and verifies [`BindingToken`]s.
#[derive(Debug, Clone)]
pub struct BindingSealer {
  key: SealKey,
  ttl: TimeDelta,
}

impl BindingSealer {
  pub fn new(key: SealKey) -> Self {
    Self { key, ttl: TimeDelta::days(DEFAULT_TTL_DAYS) }
  }

  /// Issue a token proving `(record_id, step)`.
  pub fn issue(&self, record_id: Uuid, step: u8) -> Result<BindingToken> {
    self.issue_at(record_id, step, Utc::now())
  }

  pub fn issue_at(
    &self,
    record_id: Uuid,
    step: u8,
    now: DateTime<Utc>,
  ) -> Result<BindingToken> {
    let expires_at = now + self.ttl;
    let payload = format!("{}|{}", claim(record_id, step), expires_at.timestamp());
    let value = self.key.seal(payload.as_bytes(), BINDING_AAD)?;
    Ok(BindingToken { value, expires_at })
  }

  /// `true` iff `token` opens, has not expired, and names `record_id` at one
  /// of `accepted` steps. Every failure mode collapses to `false`.
  pub fn verify(&self, token: &str, record_id: Uuid, accepted: &[u8]) -> bool {
    self.verify_at(token, record_id, accepted, Utc::now())
  }

  pub fn verify_at(
    &self,
    token: &str,
    record_id: Uuid,
    accepted: &[u8],
    now: DateTime<Utc>,
  ) -> bool {
    let Ok(bytes) = self.key.open(token, BINDING_AAD) else {
      return false;
    };
    let Ok(payload) = String::from_utf8(bytes) else {
      return false;
    };
    let Some((claimed, expires)) = payload.rsplit_once('|') else {
      return false;
    };
    let Ok(expires) = expires.parse::<i64>() else {
      return false;
    };
    if now.timestamp() >= expires {
      return false;
    }
    accepted.iter().any(|&step| claimed == claim(record_id, step))
  }
}

fn claim(record_id: Uuid, step: u8) -> String { format!("{record_id}-{step}") }
