//! [`SealKey`]: the validated 256-bit secret behind every sealed value.

use std::fmt;

use aes_gcm::{
  Aes256Gcm, Key, KeyInit, Nonce,
  aead::{Aead, AeadCore, Payload},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use rand_core::OsRng;

use crate::{Error, Result};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// A 32-byte AES-256-GCM key.
///
/// Parsed once at startup; a malformed key is a configuration error, never a
/// per-call one.
#[derive(Clone)]
pub struct SealKey {
  cipher: Aes256Gcm,
}

impl SealKey {
  /// Parse a key from configuration.
  ///
  /// A 64-character value is decoded as hex; anything else is taken as raw
  /// bytes and must be exactly 32 bytes long.
  pub fn parse(raw: &str) -> Result<Self> {
    let bytes = if raw.len() == KEY_LEN * 2 {
      hex::decode(raw)?
    } else {
      raw.as_bytes().to_vec()
    };
    Self::from_bytes(&bytes)
  }

  pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
    if bytes.len() != KEY_LEN {
      return Err(Error::KeyLength(bytes.len()));
    }
    let key = Key::<Aes256Gcm>::from_slice(bytes);
    Ok(Self { cipher: Aes256Gcm::new(key) })
  }

  /// Encrypt `msg` under a fresh nonce; returns `base64(nonce || ciphertext)`.
  pub(crate) fn seal(&self, msg: &[u8], aad: &[u8]) -> Result<String> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = self
      .cipher
      .encrypt(&nonce, Payload { msg, aad })
      .map_err(|_| Error::Seal)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(B64.encode(out))
  }

  /// Inverse of [`SealKey::seal`].
  pub(crate) fn open(&self, sealed: &str, aad: &[u8]) -> Result<Vec<u8>> {
    let data = B64.decode(sealed)?;
    if data.len() < NONCE_LEN {
      return Err(Error::Truncated);
    }
    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    self
      .cipher
      .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
      .map_err(|_| Error::Open)
  }
}

impl fmt::Debug for SealKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("SealKey(<redacted>)")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const HEX_KEY: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

  #[test]
  fn accepts_hex_and_raw_keys() {
    assert!(SealKey::parse(HEX_KEY).is_ok());
    assert!(SealKey::parse("0123456789abcdef0123456789abcdef").is_ok());
  }

  #[test]
  fn rejects_short_key() {
    assert!(matches!(SealKey::parse("too-short"), Err(Error::KeyLength(9))));
  }

  #[test]
  fn rejects_64_chars_of_non_hex() {
    let bogus = "z".repeat(64);
    assert!(matches!(SealKey::parse(&bogus), Err(Error::KeyHex(_))));
  }

  #[test]
  fn debug_does_not_leak_key_material() {
    let key = SealKey::parse(HEX_KEY).unwrap();
    assert_eq!(format!("{key:?}"), "SealKey(<redacted>)");
  }

  #[test]
  fn wrong_aad_fails_to_open() {
    let key = SealKey::parse(HEX_KEY).unwrap();
    let sealed = key.seal(b"payload", b"one").unwrap();
    assert!(matches!(key.open(&sealed, b"two"), Err(Error::Open)));
  }

  #[test]
  fn truncated_input_is_rejected() {
    let key = SealKey::parse(HEX_KEY).unwrap();
    assert!(matches!(key.open("AAAA", b"x"), Err(Error::Truncated)));
  }
}
