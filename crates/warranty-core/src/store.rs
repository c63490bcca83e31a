//! The `WarrantyStore` trait.
//!
//! Implemented by storage backends (e.g. `warranty-store-sqlite`). The
//! registration workflow and the HTTP layer depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::model::{
  NewProduct, NewSerial, Product, Serial, Step, WarrantyRecord,
};

/// Result of [`WarrantyStore::commit`].
#[derive(Debug, Clone)]
pub enum WriteOutcome {
  /// The write landed; carries the record as stored.
  Applied(WarrantyRecord),
  /// The stored step was no longer the one the caller read.
  StepMismatch,
  /// Another record already holds this serial.
  SerialTaken(String),
}

/// Abstraction over a warranty store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait WarrantyStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Inventory ─────────────────────────────────────────────────────────

  fn add_product(
    &self,
    input: NewProduct,
  ) -> impl Future<Output = Result<Product, Self::Error>> + Send + '_;

  fn get_product(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Product>, Self::Error>> + Send + '_;

  /// Fails if the serial number already exists.
  fn add_serial(
    &self,
    input: NewSerial,
  ) -> impl Future<Output = Result<Serial, Self::Error>> + Send + '_;

  /// Look up a live (not soft-deleted) serial by its short number.
  fn find_serial<'a>(
    &'a self,
    serial_number: &'a str,
  ) -> impl Future<Output = Result<Option<Serial>, Self::Error>> + Send + 'a;

  /// Whether any record holds `serial_number` as either of its serials.
  fn is_serial_claimed<'a>(
    &'a self,
    serial_number: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Records ───────────────────────────────────────────────────────────

  /// Create `count` blank records in one batch.
  fn create_blank_records(
    &self,
    count: usize,
  ) -> impl Future<Output = Result<Vec<WarrantyRecord>, Self::Error>> + Send + '_;

  fn get_record(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<WarrantyRecord>, Self::Error>> + Send + '_;

  /// Records that have been written at least once, newest first.
  fn list_registered(
    &self,
    limit: usize,
    offset: usize,
  ) -> impl Future<Output = Result<Vec<WarrantyRecord>, Self::Error>> + Send + '_;

  /// Persist `record` iff the stored step still equals `expected`.
  ///
  /// Claims every serial the record holds in the same transaction; if any
  /// serial is held by a different record nothing is written. `updated_at`
  /// is set by the store.
  fn commit(
    &self,
    record: WarrantyRecord,
    expected: Step,
  ) -> impl Future<Output = Result<WriteOutcome, Self::Error>> + Send + '_;

  fn mark_email_sent(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Flip active records whose end date is before `today` to expired.
  /// Returns the ids that changed.
  fn expire_lapsed(
    &self,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;
}
