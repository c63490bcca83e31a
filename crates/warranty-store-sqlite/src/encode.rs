//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 with fixed nanosecond precision so that string
//! order matches time order. Calendar dates are `YYYY-MM-DD`. UUIDs are
//! hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;
use warranty_core::model::{
  Product, Serial, Step, WarrantyRecord, WarrantyStatus, WarrantyYears,
};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn decode_step(code: i64) -> Result<Step> {
  u8::try_from(code)
    .ok()
    .and_then(Step::from_code)
    .ok_or_else(|| Error::Decode(format!("unknown step: {code}")))
}

pub fn decode_years(code: i64) -> Result<WarrantyYears> {
  WarrantyYears::from_code(code)
    .ok_or_else(|| Error::Decode(format!("invalid warranty years: {code}")))
}

pub fn decode_status(s: &str) -> Result<WarrantyStatus> {
  WarrantyStatus::parse(s)
    .ok_or_else(|| Error::Decode(format!("unknown status: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const PRODUCT_COLUMNS: &str = "product_id, model_number, brand, type, size, \
   warranty_years, description, is_active, created_at, deleted_at";

/// Raw values read directly from a `products` row.
pub struct RawProduct {
  pub product_id:     String,
  pub model_number:   String,
  pub brand:          String,
  pub kind:           String,
  pub size:           Option<String>,
  pub warranty_years: i64,
  pub description:    Option<String>,
  pub is_active:      bool,
  pub created_at:     String,
  pub deleted_at:     Option<String>,
}

impl RawProduct {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      product_id:     row.get(0)?,
      model_number:   row.get(1)?,
      brand:          row.get(2)?,
      kind:           row.get(3)?,
      size:           row.get(4)?,
      warranty_years: row.get(5)?,
      description:    row.get(6)?,
      is_active:      row.get(7)?,
      created_at:     row.get(8)?,
      deleted_at:     row.get(9)?,
    })
  }

  pub fn into_product(self) -> Result<Product> {
    Ok(Product {
      product_id:     decode_uuid(&self.product_id)?,
      model_number:   self.model_number,
      brand:          self.brand,
      kind:           self.kind,
      size:           self.size,
      warranty_years: decode_years(self.warranty_years)?,
      description:    self.description,
      is_active:      self.is_active,
      created_at:     decode_dt(&self.created_at)?,
      deleted_at:     self.deleted_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub const SERIAL_COLUMNS: &str =
  "serial_id, serial_number, full_serial_number, product_id, created_at, deleted_at";

/// Raw values read directly from a `serials` row.
pub struct RawSerial {
  pub serial_id:          String,
  pub serial_number:      String,
  pub full_serial_number: Option<String>,
  pub product_id:         String,
  pub created_at:         String,
  pub deleted_at:         Option<String>,
}

impl RawSerial {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      serial_id:          row.get(0)?,
      serial_number:      row.get(1)?,
      full_serial_number: row.get(2)?,
      product_id:         row.get(3)?,
      created_at:         row.get(4)?,
      deleted_at:         row.get(5)?,
    })
  }

  pub fn into_serial(self) -> Result<Serial> {
    Ok(Serial {
      serial_id:          decode_uuid(&self.serial_id)?,
      serial_number:      self.serial_number,
      full_serial_number: self.full_serial_number,
      product_id:         decode_uuid(&self.product_id)?,
      created_at:         decode_dt(&self.created_at)?,
      deleted_at:         self.deleted_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub const RECORD_COLUMNS: &str = "warranty_id, step, serial_number, serial_number_2, \
   product_id, product_id_2, warranty_years, patient_name, patient_birth_date, \
   patient_id_sealed, patient_phone_sealed, patient_email, hospital_name, \
   doctor_name, surgery_date, warranty_start_date, warranty_end_date, status, \
   confirmation_email_sent, email_sent_at, created_at, updated_at";

/// Raw values read directly from a `warranty_registrations` row.
pub struct RawRecord {
  pub warranty_id:             String,
  pub step:                    i64,
  pub serial_number:           Option<String>,
  pub serial_number_2:         Option<String>,
  pub product_id:              Option<String>,
  pub product_id_2:            Option<String>,
  pub warranty_years:          Option<i64>,
  pub patient_name:            Option<String>,
  pub patient_birth_date:      Option<String>,
  pub patient_id_sealed:       Option<String>,
  pub patient_phone_sealed:    Option<String>,
  pub patient_email:           Option<String>,
  pub hospital_name:           Option<String>,
  pub doctor_name:             Option<String>,
  pub surgery_date:            Option<String>,
  pub warranty_start_date:     Option<String>,
  pub warranty_end_date:       Option<String>,
  pub status:                  Option<String>,
  pub confirmation_email_sent: bool,
  pub email_sent_at:           Option<String>,
  pub created_at:              String,
  pub updated_at:              String,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      warranty_id:             row.get(0)?,
      step:                    row.get(1)?,
      serial_number:           row.get(2)?,
      serial_number_2:         row.get(3)?,
      product_id:              row.get(4)?,
      product_id_2:            row.get(5)?,
      warranty_years:          row.get(6)?,
      patient_name:            row.get(7)?,
      patient_birth_date:      row.get(8)?,
      patient_id_sealed:       row.get(9)?,
      patient_phone_sealed:    row.get(10)?,
      patient_email:           row.get(11)?,
      hospital_name:           row.get(12)?,
      doctor_name:             row.get(13)?,
      surgery_date:            row.get(14)?,
      warranty_start_date:     row.get(15)?,
      warranty_end_date:       row.get(16)?,
      status:                  row.get(17)?,
      confirmation_email_sent: row.get(18)?,
      email_sent_at:           row.get(19)?,
      created_at:              row.get(20)?,
      updated_at:              row.get(21)?,
    })
  }

  pub fn into_record(self) -> Result<WarrantyRecord> {
    let uuid = |s: Option<String>| s.as_deref().map(decode_uuid).transpose();
    let date = |s: Option<String>| s.as_deref().map(decode_date).transpose();

    Ok(WarrantyRecord {
      warranty_id:             decode_uuid(&self.warranty_id)?,
      step:                    decode_step(self.step)?,
      serial_number:           self.serial_number,
      serial_number_2:         self.serial_number_2,
      product_id:              uuid(self.product_id)?,
      product_id_2:            uuid(self.product_id_2)?,
      warranty_years:          self.warranty_years.map(decode_years).transpose()?,
      patient_name:            self.patient_name,
      patient_birth_date:      date(self.patient_birth_date)?,
      patient_id_sealed:       self.patient_id_sealed,
      patient_phone_sealed:    self.patient_phone_sealed,
      patient_email:           self.patient_email,
      hospital_name:           self.hospital_name,
      doctor_name:             self.doctor_name,
      surgery_date:            date(self.surgery_date)?,
      warranty_start_date:     date(self.warranty_start_date)?,
      warranty_end_date:       date(self.warranty_end_date)?,
      status:                  self.status.as_deref().map(decode_status).transpose()?,
      confirmation_email_sent: self.confirmation_email_sent,
      email_sent_at:           self.email_sent_at.as_deref().map(decode_dt).transpose()?,
      created_at:              decode_dt(&self.created_at)?,
      updated_at:              decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_sort_as_strings() {
    let a = DateTime::parse_from_rfc3339("2024-01-01T00:00:00.5Z")
      .unwrap()
      .with_timezone(&Utc);
    let b = DateTime::parse_from_rfc3339("2024-01-01T00:00:00.25Z")
      .unwrap()
      .with_timezone(&Utc);
    assert!(encode_dt(b) < encode_dt(a));
    assert_eq!(decode_dt(&encode_dt(a)).unwrap(), a);
  }

  #[test]
  fn rejects_unknown_step() {
    assert!(decode_step(4).is_err());
    assert!(decode_step(-1).is_err());
    assert_eq!(decode_step(9).unwrap(), Step::VerifiedWithoutWarranty);
  }
}
