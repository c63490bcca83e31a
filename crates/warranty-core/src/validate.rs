//! Input rules shared by the registration steps.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static SERIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[0-9]{7}-[0-9]{3}$").expect("serial pattern is valid")
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Seven ASCII digits, a hyphen, three ASCII digits.
pub fn is_valid_serial(s: &str) -> bool { SERIAL_RE.is_match(s) }

pub fn is_valid_email(s: &str) -> bool { EMAIL_RE.is_match(s) }

/// Checksum test for a domestic (Taiwan) national identity number.
///
/// Format is one region letter, one digit `1`/`2` (or `A`-`D` for older
/// resident certificates), then eight digits.
pub fn is_valid_national_id(id: &str) -> bool {
  let id = id.to_ascii_uppercase();
  let bytes = id.as_bytes();
  if bytes.len() != 10 {
    return false;
  }

  let Some(region) = region_code(bytes[0]) else {
    return false;
  };
  let second = match bytes[1] {
    b @ b'A'..=b'D' => u32::from(b - b'A'),
    b @ b'0'..=b'9' => u32::from(b - b'0'),
    _ => return false,
  };

  const WEIGHTS: [u32; 8] = [7, 6, 5, 4, 3, 2, 1, 1];
  let mut sum = region + second * 8;
  for (&b, w) in bytes[2..].iter().zip(WEIGHTS) {
    if !b.is_ascii_digit() {
      return false;
    }
    sum += u32::from(b - b'0') * w;
  }
  sum % 10 == 0
}

/// Contribution of the leading region letter: tens digit plus ones digit
/// times nine, reduced mod 10.
fn region_code(letter: u8) -> Option<u32> {
  let code = match letter {
    b'A' => 1,
    b'B' => 0,
    b'C' => 9,
    b'D' => 8,
    b'E' => 7,
    b'F' => 6,
    b'G' => 5,
    b'H' => 4,
    b'I' => 9,
    b'J' => 3,
    b'K' => 2,
    b'L' => 2,
    b'M' => 1,
    b'N' => 0,
    b'O' => 8,
    b'P' => 9,
    b'Q' => 8,
    b'R' => 7,
    b'S' => 6,
    b'T' => 5,
    b'U' => 4,
    b'V' => 3,
    b'W' => 1,
    b'X' => 3,
    b'Y' => 2,
    b'Z' => 0,
    _ => return None,
  };
  Some(code)
}

// ─── FieldErrors ─────────────────────────────────────────────────────────────

/// Per-field validation messages, keyed by the request field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
  pub fn new() -> Self { Self::default() }

  pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
    self.0.entry(field).or_insert_with(|| message.into());
  }

  /// Require a trimmed length in `min..=max` characters.
  pub fn length(
    &mut self,
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
  ) {
    let n = value.trim().chars().count();
    if n == 0 {
      self.add(field, "is required");
    } else if n < min || n > max {
      self.add(field, format!("must be {min} to {max} characters"));
    }
  }

  pub fn required(&mut self, field: &'static str, value: &str) {
    if value.trim().is_empty() {
      self.add(field, "is required");
    }
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn get(&self, field: &str) -> Option<&str> {
    self.0.get(field).map(String::as_str)
  }

  pub fn into_result(self) -> crate::Result<()> {
    if self.is_empty() {
      Ok(())
    } else {
      Err(crate::Error::Validation(self))
    }
  }
}

impl fmt::Display for FieldErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (field, message) in &self.0 {
      if !first {
        f.write_str("; ")?;
      }
      write!(f, "{field} {message}")?;
      first = false;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  #[test]
  fn serial_format() {
    assert!(is_valid_serial("1234567-890"));
    assert!(!is_valid_serial("123456-7890"));
    assert!(!is_valid_serial("1234567890"));
    assert!(!is_valid_serial(" 1234567-890"));
    assert!(!is_valid_serial("1234567-89a"));
    // Full-width digits are not ASCII digits.
    assert!(!is_valid_serial("１２３４５６７-８９０"));
  }

  #[test]
  fn national_id_checksum() {
    assert!(is_valid_national_id("A123456789"));
    assert!(!is_valid_national_id("A123456788"));
    assert!(is_valid_national_id("a123456789"));
    assert!(!is_valid_national_id("A12345678"));
    assert!(!is_valid_national_id("1123456789"));
  }

  #[test]
  fn email_shape() {
    assert!(is_valid_email("patient@example.com"));
    assert!(!is_valid_email("patient@example"));
    assert!(!is_valid_email("no at sign.com"));
    assert!(!is_valid_email(""));
  }

  #[test]
  fn field_errors_collect_first_message() {
    let mut errs = FieldErrors::new();
    errs.length("patient_name", " ", 2, 100);
    errs.length("hospital_name", "X", 2, 200);
    errs.add("patient_name", "ignored");
    assert_eq!(errs.get("patient_name"), Some("is required"));
    assert_eq!(errs.get("hospital_name"), Some("must be 2 to 200 characters"));
    assert!(errs.into_result().is_err());
  }

  #[test]
  fn length_counts_characters_not_bytes() {
    let mut errs = FieldErrors::new();
    errs.length("patient_name", "王小明", 2, 3);
    assert!(errs.is_empty());
  }

  proptest! {
    #[test]
    fn well_formed_serials_pass(a in "[0-9]{7}", b in "[0-9]{3}") {
      let serial = format!("{a}-{b}");
      prop_assert!(is_valid_serial(&serial));
    }
  }
}
