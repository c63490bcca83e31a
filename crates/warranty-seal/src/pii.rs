//! Reversible encryption of patient identity number and phone.

use crate::{Result, SealKey};

const PII_AAD: &[u8] = b"warranty-pii";

/// Seals free-text PII for at-rest storage.
///
/// Every call draws a new nonce, so encrypting the same value twice yields two
/// different ciphertexts. Equality lookups therefore have to decrypt; there is
/// no deterministic form to compare against.
#[derive(Debug, Clone)]
pub struct PiiCodec {
  key: SealKey,
}

impl PiiCodec {
  pub fn new(key: SealKey) -> Self { Self { key } }

  pub fn encrypt(&self, plaintext: &str) -> Result<String> {
    self.key.seal(plaintext.as_bytes(), PII_AAD)
  }

  pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
    let bytes = self.key.open(ciphertext, PII_AAD)?;
    Ok(String::from_utf8(bytes)?)
  }
}
