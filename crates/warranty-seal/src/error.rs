//! Error types for `warranty-seal`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("encryption key must be 32 bytes or 64 hex characters, got {0} bytes")]
  KeyLength(usize),

  #[error("encryption key is not valid hex: {0}")]
  KeyHex(#[from] hex::FromHexError),

  #[error("sealed value is not valid base64: {0}")]
  Encoding(#[from] base64::DecodeError),

  #[error("sealed value is shorter than a nonce")]
  Truncated,

  #[error("encryption failed")]
  Seal,

  /// Wrong key, wrong associated data, or a tampered ciphertext.
  #[error("authenticated decryption failed")]
  Open,

  #[error("decrypted value is not valid UTF-8")]
  Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
