//! Outbound notifications sent once a warranty is established.

use std::future::Future;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  model::{Product, WarrantyRecord, WarrantyYears},
  store::WarrantyStore,
};

/// What the patient and the company are told about an established warranty.
///
/// Carries no identity number or phone.
#[derive(Debug, Clone)]
pub struct Confirmation {
  pub warranty_id:       Uuid,
  pub patient_name:      String,
  pub patient_email:     String,
  pub serial_number:     String,
  pub serial_number_2:   Option<String>,
  pub surgery_date:      Option<NaiveDate>,
  pub warranty_end_date: Option<NaiveDate>,
  pub warranty_years:    Option<WarrantyYears>,
  pub hospital_name:     Option<String>,
  pub doctor_name:       Option<String>,
  pub product:           Option<Product>,
}

impl Confirmation {
  /// `None` when the record lacks a recipient, a name, or a serial.
  pub fn from_record(
    record: &WarrantyRecord,
    product: Option<Product>,
  ) -> Option<Self> {
    Some(Self {
      warranty_id: record.warranty_id,
      patient_name: record.patient_name.clone()?,
      patient_email: record.patient_email.clone()?,
      serial_number: record.serial_number.clone()?,
      serial_number_2: record.serial_number_2.clone(),
      surgery_date: record.surgery_date,
      warranty_end_date: record.warranty_end_date,
      warranty_years: record.warranty_years,
      hospital_name: record.hospital_name.clone(),
      doctor_name: record.doctor_name.clone(),
      product,
    })
  }

  /// First character of the patient's name.
  pub fn surname(&self) -> &str {
    self
      .patient_name
      .char_indices()
      .nth(1)
      .map_or(self.patient_name.as_str(), |(i, _)| &self.patient_name[..i])
  }

  pub fn is_lifetime(&self) -> bool {
    self.warranty_years == Some(WarrantyYears::Lifetime)
  }
}

/// Delivery channel for confirmation and company notices.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Mail the patient their confirmation.
  fn send_confirmation<'a>(
    &'a self,
    confirmation: &'a Confirmation,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Tell the company a registration was completed.
  fn notify_company<'a>(
    &'a self,
    confirmation: &'a Confirmation,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Notifier used when no mail provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
  type Error = std::convert::Infallible;

  async fn send_confirmation(
    &self,
    confirmation: &Confirmation,
  ) -> Result<(), Self::Error> {
    tracing::info!(
      warranty_id = %confirmation.warranty_id,
      "mail not configured; skipping confirmation"
    );
    Ok(())
  }

  async fn notify_company(
    &self,
    confirmation: &Confirmation,
  ) -> Result<(), Self::Error> {
    tracing::debug!(
      warranty_id = %confirmation.warranty_id,
      "mail not configured; skipping company notice"
    );
    Ok(())
  }
}

/// Send the patient confirmation, record that it went out, then notify the
/// company. Every failure is logged and swallowed.
pub async fn deliver<S, N>(store: &S, notifier: &N, confirmation: Confirmation)
where
  S: WarrantyStore,
  N: Notifier,
{
  let id = confirmation.warranty_id;
  match notifier.send_confirmation(&confirmation).await {
    Ok(()) => {
      if let Err(e) = store.mark_email_sent(id, Utc::now()).await {
        tracing::error!(warranty_id = %id, error = %e, "failed to mark email sent");
      }
    }
    Err(e) => {
      tracing::error!(warranty_id = %id, error = %e, "confirmation email failed");
    }
  }

  if let Err(e) = notifier.notify_company(&confirmation).await {
    tracing::warn!(warranty_id = %id, error = %e, "company notice failed");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record() -> WarrantyRecord {
    let mut r = WarrantyRecord::blank(Uuid::new_v4(), Utc::now());
    r.patient_name = Some("王小明".into());
    r.patient_email = Some("p@example.com".into());
    r.serial_number = Some("1234567-890".into());
    r
  }

  #[test]
  fn surname_is_first_character() {
    let c = Confirmation::from_record(&record(), None).unwrap();
    assert_eq!(c.surname(), "王");
  }

  #[test]
  fn surname_of_single_character_name() {
    let mut r = record();
    r.patient_name = Some("A".into());
    let c = Confirmation::from_record(&r, None).unwrap();
    assert_eq!(c.surname(), "A");
  }

  #[test]
  fn needs_an_email() {
    let mut r = record();
    r.patient_email = None;
    assert!(Confirmation::from_record(&r, None).is_none());
  }
}
