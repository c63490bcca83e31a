//! The patient-facing registration flow.
//!
//! ```text
//!   Blank ──step1──▶ SerialVerified ──step2──▶ PatientInfoFilled ──step3──▶ Established
//!     │                                  ▲            │
//!     │                                  └───step2────┘
//!     └──step1 (zero coverage)──▶ VerifiedWithoutWarranty
//! ```
//!
//! Steps 2 and 3 must present the binding token handed out by the previous
//! step. Every transition re-reads the record, checks its preconditions, and
//! then writes conditionally on the step it read, so a stale or concurrent
//! request can never move a record backwards.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;
use warranty_seal::{BindingSealer, BindingToken, PiiCodec};

use crate::{
  Error, Result,
  audit::{Actor, AuditAction, AuditEntry, AuditSink, WARRANTY_ENTITY, log_entry},
  model::{Step, WarrantyRecord, WarrantyStatus},
  notify::{Confirmation, Notifier, deliver},
  serial::{Availability, SerialValidator},
  store::{WarrantyStore, WriteOutcome},
  validate::{FieldErrors, is_valid_email, is_valid_national_id, is_valid_serial},
  window::WarrantyWindow,
};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Step 1 submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SerialStep {
  pub serial_number:   String,
  #[serde(default)]
  pub serial_number_2: Option<String>,
  pub surgery_date:    NaiveDate,
}

/// Step 2 submission.
#[derive(Debug, Clone, Deserialize)]
pub struct PatientDetails {
  pub patient_name:         String,
  pub patient_id:           String,
  #[serde(default)]
  pub is_domestic_identity: bool,
  pub patient_birth_date:   NaiveDate,
  pub patient_phone:        String,
  pub patient_email:        String,
  pub hospital_name:        String,
  pub doctor_name:          String,
}

impl PatientDetails {
  fn validate(&self, today: NaiveDate) -> Result<()> {
    let mut errs = FieldErrors::new();
    errs.length("patient_name", &self.patient_name, 2, 100);
    errs.length("hospital_name", &self.hospital_name, 2, 200);
    errs.length("doctor_name", &self.doctor_name, 2, 100);
    errs.length("patient_phone", &self.patient_phone, 1, 30);

    errs.required("patient_id", &self.patient_id);
    if self.is_domestic_identity
      && !self.patient_id.trim().is_empty()
      && !is_valid_national_id(self.patient_id.trim())
    {
      errs.add("patient_id", "is not a valid national identity number");
    }

    errs.required("patient_email", &self.patient_email);
    if !self.patient_email.trim().is_empty()
      && !is_valid_email(self.patient_email.trim())
    {
      errs.add("patient_email", "is not a valid email address");
    }

    if self.patient_birth_date > today {
      errs.add("patient_birth_date", "cannot be in the future");
    }

    errs.into_result()
  }
}

// ─── Outputs ─────────────────────────────────────────────────────────────────

/// A successful step 1 or step 2.
#[derive(Debug, Clone)]
pub struct Advanced {
  pub record:  WarrantyRecord,
  /// Token to hand back to the browser; `None` when the flow has ended.
  pub binding: Option<BindingToken>,
}

// ─── Registrar ───────────────────────────────────────────────────────────────

/// Drives a record through the patient registration steps.
pub struct Registrar<S, N, A> {
  store:    Arc<S>,
  notifier: Arc<N>,
  audit:    Arc<A>,
  pii:      PiiCodec,
  binding:  BindingSealer,
}

impl<S, N, A> Clone for Registrar<S, N, A> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      notifier: Arc::clone(&self.notifier),
      audit:    Arc::clone(&self.audit),
      pii:      self.pii.clone(),
      binding:  self.binding.clone(),
    }
  }
}

impl<S, N, A> Registrar<S, N, A>
where
  S: WarrantyStore + 'static,
  N: Notifier + 'static,
  A: AuditSink,
{
  pub fn new(
    store: Arc<S>,
    notifier: Arc<N>,
    audit: Arc<A>,
    pii: PiiCodec,
    binding: BindingSealer,
  ) -> Self {
    Self { store, notifier, audit, pii, binding }
  }

  /// Current step, without side effects.
  pub async fn status(&self, id: Uuid) -> Result<Step> {
    Ok(self.load(id).await?.step)
  }

  /// Public serial lookup for a record that has not yet started.
  ///
  /// Answers forbidden for any record past `Blank` and for serials that are
  /// not eligible, so the endpoint cannot be used to enumerate inventory
  /// against finished registrations.
  pub async fn check_serial(&self, id: Uuid, serial_number: &str) -> Result<Uuid> {
    // Unknown ids answer like advanced ones so ids cannot be enumerated.
    let step = match self.status(id).await {
      Err(Error::RecordNotFound(_)) => return Err(Error::Forbidden),
      other => other?,
    };
    if step != Step::Blank {
      return Err(Error::Forbidden);
    }
    match SerialValidator::new(&*self.store)
      .availability(serial_number.trim())
      .await?
    {
      Availability::Unknown => Err(Error::Forbidden),
      Availability::Claimed => Err(Error::SerialInUse(serial_number.trim().to_owned())),
      Availability::Available { product_id } => Ok(product_id),
    }
  }

  /// Step 1: bind serials and fix the warranty window.
  pub async fn submit_serials(
    &self,
    id: Uuid,
    input: SerialStep,
    actor: &Actor,
  ) -> Result<Advanced> {
    let primary = input.serial_number.trim();
    let secondary = input
      .serial_number_2
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty());

    for serial in std::iter::once(primary).chain(secondary) {
      if !is_valid_serial(serial) {
        return Err(Error::SerialFormat(serial.to_owned()));
      }
    }
    if secondary == Some(primary) {
      return Err(Error::DuplicateSerial);
    }
    if input.surgery_date > Utc::now().date_naive() {
      return Err(Error::SurgeryInFuture);
    }

    let before = self.load(id).await?;
    if before.step != Step::Blank {
      return Err(Error::AlreadyFilled);
    }

    let pair = SerialValidator::new(&*self.store)
      .check_pair(primary, secondary)
      .await?;
    let window = WarrantyWindow::compute(input.surgery_date, pair.warranty_years);

    let mut record = before.clone();
    record.serial_number = Some(pair.primary.serial.serial_number.clone());
    record.product_id = Some(pair.primary.product.product_id);
    record.serial_number_2 =
      pair.secondary.as_ref().map(|s| s.serial.serial_number.clone());
    record.product_id_2 = pair.secondary.as_ref().map(|s| s.product.product_id);
    record.warranty_years = Some(pair.warranty_years);
    record.surgery_date = Some(input.surgery_date);
    record.warranty_start_date = Some(window.start);
    record.warranty_end_date = Some(window.end);
    record.step = if pair.warranty_years.is_zero() {
      Step::VerifiedWithoutWarranty
    } else {
      Step::SerialVerified
    };

    let binding = match record.step {
      Step::SerialVerified => Some(self.binding.issue(id, record.step.code())?),
      _ => None,
    };

    let record = match self.store.commit(record, Step::Blank).await.map_err(Error::store)? {
      WriteOutcome::Applied(r) => r,
      WriteOutcome::StepMismatch => return Err(Error::AlreadyFilled),
      WriteOutcome::SerialTaken(s) => return Err(Error::SerialInUse(s)),
    };

    tracing::info!(warranty_id = %id, step = record.step.code(), "serials verified");
    self.audit_update(actor, &before, &record).await;
    Ok(Advanced { record, binding })
  }

  /// Step 2: record patient details. May be repeated until confirmation.
  pub async fn submit_patient(
    &self,
    id: Uuid,
    token: Option<&str>,
    input: PatientDetails,
    actor: &Actor,
  ) -> Result<Advanced> {
    self.authorize(id, token, &[Step::SerialVerified, Step::PatientInfoFilled])?;

    let before = self.load(id).await?;
    input.validate(Utc::now().date_naive())?;
    if !matches!(before.step, Step::SerialVerified | Step::PatientInfoFilled) {
      return Err(Error::CannotBeFilled);
    }

    let mut record = before.clone();
    record.patient_name = Some(input.patient_name.trim().to_owned());
    let patient_id = if input.is_domestic_identity {
      input.patient_id.trim().to_ascii_uppercase()
    } else {
      input.patient_id.trim().to_owned()
    };
    record.patient_id_sealed = Some(self.pii.encrypt(&patient_id)?);
    record.patient_phone_sealed =
      Some(self.pii.encrypt(input.patient_phone.trim())?);
    record.patient_birth_date = Some(input.patient_birth_date);
    record.patient_email = Some(input.patient_email.trim().to_owned());
    record.hospital_name = Some(input.hospital_name.trim().to_owned());
    record.doctor_name = Some(input.doctor_name.trim().to_owned());
    record.step = Step::PatientInfoFilled;

    let binding = self.binding.issue(id, Step::PatientInfoFilled.code())?;

    let record = match self.store.commit(record, before.step).await.map_err(Error::store)? {
      WriteOutcome::Applied(r) => r,
      WriteOutcome::StepMismatch => return Err(Error::CannotBeFilled),
      WriteOutcome::SerialTaken(s) => return Err(Error::SerialInUse(s)),
    };

    tracing::info!(warranty_id = %id, "patient details recorded");
    self.audit_update(actor, &before, &record).await;
    Ok(Advanced { record, binding: Some(binding) })
  }

  /// Step 3: establish the warranty and send the confirmation in the
  /// background.
  pub async fn confirm(
    &self,
    id: Uuid,
    token: Option<&str>,
    actor: &Actor,
  ) -> Result<WarrantyRecord> {
    self.authorize(id, token, &[Step::PatientInfoFilled])?;

    let before = self.load(id).await?;
    if before.step != Step::PatientInfoFilled {
      return Err(Error::CannotBeConfirmed);
    }

    let mut record = before.clone();
    record.step = Step::Established;
    record.status = Some(WarrantyStatus::Active);

    let record = match self
      .store
      .commit(record, Step::PatientInfoFilled)
      .await
      .map_err(Error::store)?
    {
      WriteOutcome::Applied(r) => r,
      WriteOutcome::StepMismatch => return Err(Error::CannotBeConfirmed),
      WriteOutcome::SerialTaken(s) => return Err(Error::SerialInUse(s)),
    };

    tracing::info!(warranty_id = %id, "warranty established");
    self.audit_update(actor, &before, &record).await;
    self.spawn_delivery(record.clone());
    Ok(record)
  }

  /// The in-progress record for a resumed session, with sealed fields
  /// stripped.
  pub async fn draft(&self, id: Uuid, token: Option<&str>) -> Result<WarrantyRecord> {
    let accepted = [Step::SerialVerified, Step::PatientInfoFilled];
    self.authorize(id, token, &accepted)?;

    let mut record = self.load(id).await?;
    if !accepted.contains(&record.step) {
      return Err(Error::Forbidden);
    }
    record.patient_id_sealed = None;
    record.patient_phone_sealed = None;
    Ok(record)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  fn authorize(&self, id: Uuid, token: Option<&str>, accepted: &[Step]) -> Result<()> {
    let codes: Vec<u8> = accepted.iter().map(|s| s.code()).collect();
    match token {
      Some(t) if self.binding.verify(t, id, &codes) => Ok(()),
      _ => Err(Error::Forbidden),
    }
  }

  async fn load(&self, id: Uuid) -> Result<WarrantyRecord> {
    self
      .store
      .get_record(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::RecordNotFound(id))
  }

  async fn audit_update(
    &self,
    actor: &Actor,
    before: &WarrantyRecord,
    after: &WarrantyRecord,
  ) {
    let entry = AuditEntry::new(actor, AuditAction::Update, WARRANTY_ENTITY)
      .id(after.warranty_id)
      .before(before)
      .after(after);
    log_entry(&*self.audit, entry).await;
  }

  fn spawn_delivery(&self, record: WarrantyRecord) {
    let store = Arc::clone(&self.store);
    let notifier = Arc::clone(&self.notifier);
    tokio::spawn(async move {
      let product = match record.product_id {
        Some(pid) => match store.get_product(pid).await {
          Ok(p) => p,
          Err(e) => {
            tracing::warn!(warranty_id = %record.warranty_id, error = %e, "product lookup for email failed");
            None
          }
        },
        None => None,
      };
      let Some(confirmation) = Confirmation::from_record(&record, product) else {
        tracing::warn!(warranty_id = %record.warranty_id, "record incomplete; no confirmation sent");
        return;
      };
      deliver(&*store, &*notifier, confirmation).await;
    });
  }
}
