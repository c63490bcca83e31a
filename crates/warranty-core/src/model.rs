//! Warranty records, products and serials.
//!
//! A [`WarrantyRecord`] is created blank by staff and then accumulates data as
//! the patient moves through the registration steps. Rather than one type per
//! step, the record keeps every field nullable and an explicit [`Step`]
//! discriminant says which of them are populated and trusted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Step ────────────────────────────────────────────────────────────────────

/// Position of a record in the patient registration flow.
///
/// Serialised as its integer code, which is also what the binding token and
/// the `step` column carry.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Step {
  /// Created by staff; nothing filled in.
  Blank,
  /// Serials checked against inventory and the warranty window fixed.
  SerialVerified,
  /// Patient identity and clinic details recorded.
  PatientInfoFilled,
  /// Confirmed by the patient; the warranty is in force.
  Established,
  /// Serials verified but the product carries no warranty. Terminal.
  VerifiedWithoutWarranty,
}

impl Step {
  pub fn code(self) -> u8 {
    match self {
      Self::Blank => 0,
      Self::SerialVerified => 1,
      Self::PatientInfoFilled => 2,
      Self::Established => 3,
      Self::VerifiedWithoutWarranty => 9,
    }
  }

  pub fn from_code(code: u8) -> Option<Self> {
    match code {
      0 => Some(Self::Blank),
      1 => Some(Self::SerialVerified),
      2 => Some(Self::PatientInfoFilled),
      3 => Some(Self::Established),
      9 => Some(Self::VerifiedWithoutWarranty),
      _ => None,
    }
  }
}

impl From<Step> for u8 {
  fn from(step: Step) -> u8 { step.code() }
}

impl TryFrom<u8> for Step {
  type Error = String;

  fn try_from(code: u8) -> Result<Self, Self::Error> {
    Step::from_code(code).ok_or_else(|| format!("unknown step code: {code}"))
  }
}

// ─── Warranty length ─────────────────────────────────────────────────────────

/// Coverage length attached to a product.
///
/// Stored as an integer: `-1` lifetime, `0` none, `N` years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum WarrantyYears {
  None,
  Years(u16),
  Lifetime,
}

impl WarrantyYears {
  pub fn code(self) -> i64 {
    match self {
      Self::None => 0,
      Self::Years(n) => i64::from(n),
      Self::Lifetime => -1,
    }
  }

  pub fn from_code(code: i64) -> Option<Self> {
    match code {
      -1 => Some(Self::Lifetime),
      0 => Some(Self::None),
      n => u16::try_from(n).ok().map(Self::Years),
    }
  }

  pub fn is_zero(self) -> bool { matches!(self, Self::None | Self::Years(0)) }
}

impl From<WarrantyYears> for i64 {
  fn from(y: WarrantyYears) -> i64 { y.code() }
}

impl TryFrom<i64> for WarrantyYears {
  type Error = String;

  fn try_from(code: i64) -> Result<Self, Self::Error> {
    WarrantyYears::from_code(code)
      .ok_or_else(|| format!("invalid warranty years: {code}"))
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Stored and derived warranty status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarrantyStatus {
  Unset,
  Active,
  Expired,
  Cancelled,
}

impl WarrantyStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Unset => "unset",
      Self::Active => "active",
      Self::Expired => "expired",
      Self::Cancelled => "cancelled",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "unset" => Some(Self::Unset),
      "active" => Some(Self::Active),
      "expired" => Some(Self::Expired),
      "cancelled" => Some(Self::Cancelled),
      _ => None,
    }
  }
}

// ─── Inventory ───────────────────────────────────────────────────────────────

/// A catalogue entry; serials point at exactly one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
  pub product_id:     Uuid,
  pub model_number:   String,
  pub brand:          String,
  #[serde(rename = "type")]
  pub kind:           String,
  pub size:           Option<String>,
  pub warranty_years: WarrantyYears,
  pub description:    Option<String>,
  pub is_active:      bool,
  pub created_at:     DateTime<Utc>,
  pub deleted_at:     Option<DateTime<Utc>>,
}

impl Product {
  /// Eligible to back a new warranty.
  pub fn is_usable(&self) -> bool { self.is_active && self.deleted_at.is_none() }
}

/// Input to [`crate::store::WarrantyStore::add_product`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
  pub model_number:   String,
  pub brand:          String,
  #[serde(rename = "type")]
  pub kind:           String,
  pub size:           Option<String>,
  pub warranty_years: WarrantyYears,
  pub description:    Option<String>,
  #[serde(default = "default_true")]
  pub is_active:      bool,
}

fn default_true() -> bool { true }

/// An inventory serial number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Serial {
  pub serial_id:          Uuid,
  pub serial_number:      String,
  pub full_serial_number: Option<String>,
  pub product_id:         Uuid,
  pub created_at:         DateTime<Utc>,
  pub deleted_at:         Option<DateTime<Utc>>,
}

/// Input to [`crate::store::WarrantyStore::add_serial`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewSerial {
  pub serial_number:      String,
  pub full_serial_number: Option<String>,
  pub product_id:         Uuid,
}

// ─── WarrantyRecord ──────────────────────────────────────────────────────────

/// One implantation event.
///
/// `patient_id_sealed` and `patient_phone_sealed` hold PII-codec ciphertext
/// and are never serialised; plaintext exists only in
/// [`crate::backoffice::DecryptedRecord`].
#[derive(Debug, Clone, Serialize)]
pub struct WarrantyRecord {
  pub warranty_id:             Uuid,
  pub step:                    Step,

  pub serial_number:           Option<String>,
  pub serial_number_2:         Option<String>,
  pub product_id:              Option<Uuid>,
  pub product_id_2:            Option<Uuid>,
  /// Reconciled across both serials.
  pub warranty_years:          Option<WarrantyYears>,

  pub patient_name:            Option<String>,
  pub patient_birth_date:      Option<NaiveDate>,
  #[serde(skip)]
  pub patient_id_sealed:       Option<String>,
  #[serde(skip)]
  pub patient_phone_sealed:    Option<String>,
  pub patient_email:           Option<String>,

  pub hospital_name:           Option<String>,
  pub doctor_name:             Option<String>,
  pub surgery_date:            Option<NaiveDate>,

  pub warranty_start_date:     Option<NaiveDate>,
  pub warranty_end_date:       Option<NaiveDate>,
  /// `None` until the patient confirms.
  pub status:                  Option<WarrantyStatus>,

  pub confirmation_email_sent: bool,
  pub email_sent_at:           Option<DateTime<Utc>>,

  pub created_at:              DateTime<Utc>,
  pub updated_at:              DateTime<Utc>,
}

impl WarrantyRecord {
  /// A freshly created, never-written record.
  pub fn blank(warranty_id: Uuid, now: DateTime<Utc>) -> Self {
    Self {
      warranty_id,
      step: Step::Blank,
      serial_number: None,
      serial_number_2: None,
      product_id: None,
      product_id_2: None,
      warranty_years: None,
      patient_name: None,
      patient_birth_date: None,
      patient_id_sealed: None,
      patient_phone_sealed: None,
      patient_email: None,
      hospital_name: None,
      doctor_name: None,
      surgery_date: None,
      warranty_start_date: None,
      warranty_end_date: None,
      status: None,
      confirmation_email_sent: false,
      email_sent_at: None,
      created_at: now,
      updated_at: now,
    }
  }

  /// Never touched since batch creation. Excluded from staff listings.
  pub fn is_blank(&self) -> bool { self.created_at == self.updated_at }

  /// The serials this record holds, primary first.
  pub fn serials(&self) -> impl Iterator<Item = &str> {
    self
      .serial_number
      .as_deref()
      .into_iter()
      .chain(self.serial_number_2.as_deref())
  }

  /// Status as of `today`: cancelled is sticky, then expiry, then active.
  pub fn current_status(&self, today: NaiveDate) -> WarrantyStatus {
    match self.status {
      None | Some(WarrantyStatus::Unset) => WarrantyStatus::Unset,
      Some(WarrantyStatus::Cancelled) => WarrantyStatus::Cancelled,
      Some(_) if self.is_expired(today) => WarrantyStatus::Expired,
      Some(_) => WarrantyStatus::Active,
    }
  }

  fn is_expired(&self, today: NaiveDate) -> bool {
    if self.warranty_years == Some(WarrantyYears::Lifetime) {
      return false;
    }
    self.warranty_end_date.is_some_and(|end| end < today)
  }
}
