//! Authenticated encryption for the warranty service.
//!
//! Two consumers share one 32-byte key:
//!
//! - [`PiiCodec`] seals the patient's government ID and phone number before
//!   they reach the database.
//! - [`BindingSealer`] issues the opaque device-binding token that proves a
//!   multi-step registration is being continued by the browser that began it.
//!
//! Both use AES-256-GCM with a fresh random nonce per call, and each binds its
//! ciphertexts to a distinct associated-data label so a sealed phone number can
//! never be presented as a binding token (or vice versa).

pub mod binding;
pub mod error;
pub mod key;
pub mod pii;

pub use binding::{BindingSealer, BindingToken};
pub use error::{Error, Result};
pub use key::SealKey;
pub use pii::PiiCodec;
