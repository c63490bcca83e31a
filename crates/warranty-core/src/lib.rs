//! Core types and workflow for implant warranty registration.
//!
//! This crate holds the registration state machine, serial eligibility rules
//! and warranty window arithmetic. Storage, mail delivery and audit logging
//! are reached through the [`WarrantyStore`], [`Notifier`] and [`AuditSink`]
//! traits; it has no HTTP or database dependencies of its own.

// Native `async fn` in traits; the trait definitions spell out `Send` bounds
// on their futures themselves.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod backoffice;
pub mod error;
pub mod model;
pub mod notify;
pub mod registration;
pub mod serial;
pub mod store;
pub mod validate;
pub mod window;

pub use audit::{Actor, AuditAction, AuditEntry, AuditSink};
pub use backoffice::{Backoffice, DecryptedRecord};
pub use error::{Error, Result};
pub use model::{Step, WarrantyRecord, WarrantyStatus, WarrantyYears};
pub use notify::{Confirmation, NoopNotifier, Notifier};
pub use registration::{Advanced, PatientDetails, Registrar, SerialStep};
pub use store::{WarrantyStore, WriteOutcome};
