//! Staff operations: issuing blank records, inventory, and record review.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;
use warranty_seal::PiiCodec;

use crate::{
  Error, Result,
  audit::{Actor, AuditAction, AuditEntry, AuditSink, WARRANTY_ENTITY, log_entry},
  model::{
    NewProduct, NewSerial, Product, Serial, Step, WarrantyRecord,
    WarrantyStatus,
  },
  notify::{Confirmation, Notifier},
  store::WarrantyStore,
  validate::is_valid_serial,
};

/// Upper bound on a single batch of blank records.
pub const MAX_BATCH: usize = 100;

/// Upper bound on a listing page.
pub const MAX_PAGE: usize = 100;

/// Staff view of a record with identity and phone decrypted.
#[derive(Debug, Clone, Serialize)]
pub struct DecryptedRecord {
  #[serde(flatten)]
  pub record:         WarrantyRecord,
  pub patient_id:     Option<String>,
  pub patient_phone:  Option<String>,
  pub current_status: WarrantyStatus,
}

pub struct Backoffice<S, N, A> {
  store:    Arc<S>,
  notifier: Arc<N>,
  audit:    Arc<A>,
  pii:      PiiCodec,
}

impl<S, N, A> Clone for Backoffice<S, N, A> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      notifier: Arc::clone(&self.notifier),
      audit:    Arc::clone(&self.audit),
      pii:      self.pii.clone(),
    }
  }
}

impl<S, N, A> Backoffice<S, N, A>
where
  S: WarrantyStore,
  N: Notifier,
  A: AuditSink,
{
  pub fn new(store: Arc<S>, notifier: Arc<N>, audit: Arc<A>, pii: PiiCodec) -> Self {
    Self { store, notifier, audit, pii }
  }

  /// Issue `count` blank records for distribution to clinics.
  pub async fn batch_create(
    &self,
    count: usize,
    actor: &Actor,
  ) -> Result<Vec<WarrantyRecord>> {
    if !(1..=MAX_BATCH).contains(&count) {
      return Err(Error::BadRequest(format!(
        "count must be between 1 and {MAX_BATCH}"
      )));
    }

    let records = self
      .store
      .create_blank_records(count)
      .await
      .map_err(Error::store)?;

    for record in &records {
      let entry = AuditEntry::new(actor, AuditAction::Create, WARRANTY_ENTITY)
        .id(record.warranty_id)
        .after(record);
      log_entry(&*self.audit, entry).await;
    }
    tracing::info!(count, "blank warranty records created");
    Ok(records)
  }

  /// Records that have been touched since creation, newest first.
  pub async fn list_registered(
    &self,
    limit: Option<usize>,
    offset: Option<usize>,
  ) -> Result<Vec<WarrantyRecord>> {
    let limit = limit.unwrap_or(20).clamp(1, MAX_PAGE);
    self
      .store
      .list_registered(limit, offset.unwrap_or(0))
      .await
      .map_err(Error::store)
  }

  pub async fn get_decrypted(&self, id: Uuid) -> Result<DecryptedRecord> {
    let record = self.load(id).await?;
    let patient_id = record
      .patient_id_sealed
      .as_deref()
      .map(|c| self.pii.decrypt(c))
      .transpose()?;
    let patient_phone = record
      .patient_phone_sealed
      .as_deref()
      .map(|c| self.pii.decrypt(c))
      .transpose()?;
    let current_status = record.current_status(Utc::now().date_naive());
    Ok(DecryptedRecord { record, patient_id, patient_phone, current_status })
  }

  /// Send the confirmation again, waiting for the provider's answer.
  pub async fn resend_confirmation(&self, id: Uuid, actor: &Actor) -> Result<()> {
    let record = self.load(id).await?;
    if record.step != Step::Established {
      return Err(Error::BadRequest("warranty is not established".into()));
    }

    let product = match record.product_id {
      Some(pid) => self.store.get_product(pid).await.map_err(Error::store)?,
      None => None,
    };
    let confirmation = Confirmation::from_record(&record, product)
      .ok_or_else(|| Error::BadRequest("record has no recipient".into()))?;

    self
      .notifier
      .send_confirmation(&confirmation)
      .await
      .map_err(|e| Error::Notify(Box::new(e)))?;

    let sent_at = Utc::now();
    self.store.mark_email_sent(id, sent_at).await.map_err(Error::store)?;

    let entry = AuditEntry::new(actor, AuditAction::Update, WARRANTY_ENTITY)
      .id(id)
      .after(&serde_json::json!({ "email_sent_at": sent_at }));
    log_entry(&*self.audit, entry).await;
    Ok(())
  }

  /// Mark every active warranty whose end date has passed as expired.
  pub async fn expire_lapsed(&self, actor: &Actor) -> Result<Vec<Uuid>> {
    let expired = self
      .store
      .expire_lapsed(Utc::now().date_naive())
      .await
      .map_err(Error::store)?;

    for id in &expired {
      let entry = AuditEntry::new(actor, AuditAction::Update, WARRANTY_ENTITY)
        .id(*id)
        .before(&serde_json::json!({ "status": WarrantyStatus::Active }))
        .after(&serde_json::json!({ "status": WarrantyStatus::Expired }));
      log_entry(&*self.audit, entry).await;
    }
    tracing::info!(count = expired.len(), "expired lapsed warranties");
    Ok(expired)
  }

  pub async fn add_product(&self, input: NewProduct, actor: &Actor) -> Result<Product> {
    if input.model_number.trim().is_empty() || input.brand.trim().is_empty() {
      return Err(Error::BadRequest("model_number and brand are required".into()));
    }
    let product = self.store.add_product(input).await.map_err(Error::store)?;
    let entry = AuditEntry::new(actor, AuditAction::Create, "products")
      .id(product.product_id)
      .after(&product);
    log_entry(&*self.audit, entry).await;
    Ok(product)
  }

  pub async fn add_serial(&self, input: NewSerial, actor: &Actor) -> Result<Serial> {
    if !is_valid_serial(&input.serial_number) {
      return Err(Error::SerialFormat(input.serial_number));
    }
    if self
      .store
      .get_product(input.product_id)
      .await
      .map_err(Error::store)?
      .is_none()
    {
      return Err(Error::ProductNotFound(input.product_id));
    }
    if self
      .store
      .find_serial(&input.serial_number)
      .await
      .map_err(Error::store)?
      .is_some()
    {
      return Err(Error::BadRequest(format!(
        "serial {} already exists",
        input.serial_number
      )));
    }

    let serial = self.store.add_serial(input).await.map_err(Error::store)?;
    let entry = AuditEntry::new(actor, AuditAction::Create, "serials")
      .id(serial.serial_id)
      .after(&serial);
    log_entry(&*self.audit, entry).await;
    Ok(serial)
  }

  async fn load(&self, id: Uuid) -> Result<WarrantyRecord> {
    self
      .store
      .get_record(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::RecordNotFound(id))
  }
}
