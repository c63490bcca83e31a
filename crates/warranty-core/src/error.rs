//! Error types for `warranty-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::validate::FieldErrors;

#[derive(Debug, Error)]
pub enum Error {
  #[error("warranty record not found: {0}")]
  RecordNotFound(Uuid),

  #[error("product not found: {0}")]
  ProductNotFound(Uuid),

  // ── Serial / step-1 input ─────────────────────────────────────────────────
  #[error("serial number must look like NNNNNNN-NNN: {0:?}")]
  SerialFormat(String),

  #[error("serial number is not in inventory: {0}")]
  SerialNotFound(String),

  #[error("product for serial {0} is not active")]
  ProductInactive(String),

  #[error("serial number already registered: {0}")]
  SerialInUse(String),

  #[error("the two serial numbers must differ")]
  DuplicateSerial,

  #[error("surgery date cannot be in the future")]
  SurgeryInFuture,

  // ── Field validation ──────────────────────────────────────────────────────
  #[error("invalid fields: {0}")]
  Validation(FieldErrors),

  #[error("invalid request: {0}")]
  BadRequest(String),

  // ── Step conflicts ────────────────────────────────────────────────────────
  #[error("warranty has already been filled")]
  AlreadyFilled,

  #[error("warranty cannot be filled")]
  CannotBeFilled,

  #[error("warranty cannot be confirmed")]
  CannotBeConfirmed,

  /// Missing, tampered, expired or mismatched device-binding token.
  #[error("forbidden")]
  Forbidden,

  // ── Dependent services ────────────────────────────────────────────────────
  #[error("seal error: {0}")]
  Seal(#[from] warranty_seal::Error),

  #[error("notification failed: {0}")]
  Notify(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
