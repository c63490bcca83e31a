//! HTTP layer for implant warranty registration.
//!
//! Exposes an axum [`Router`] with the patient registration flow and the
//! staff back office, backed by any [`WarrantyStore`] that is also an
//! [`AuditSink`].

pub mod auth;
pub mod cookie;
pub mod error;
pub mod handlers;
pub mod mailgun;

pub use error::Error;
pub use mailgun::{MailgunConfig, MailgunNotifier};

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post, put},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use warranty_core::{AuditSink, Backoffice, Notifier, Registrar, WarrantyStore};
use warranty_seal::{BindingSealer, PiiCodec, SealKey};

use auth::AuthConfig;
use handlers::{admin, patient};

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_true() -> bool { true }

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  /// 64 hex characters or 32 raw bytes.
  pub encryption_key:      String,
  pub admin_username:      String,
  pub admin_password_hash: String,
  /// Mark the binding cookie `Secure; SameSite=None`.
  #[serde(default = "default_true")]
  pub cookie_secure:       bool,
  #[serde(default)]
  pub mailgun:             Option<MailgunConfig>,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, N> {
  pub registrar: Registrar<S, N, S>,
  pub office:    Backoffice<S, N, S>,
  pub config:    Arc<ServerConfig>,
  pub auth:      Arc<AuthConfig>,
}

impl<S, N> Clone for AppState<S, N> {
  fn clone(&self) -> Self {
    Self {
      registrar: self.registrar.clone(),
      office:    self.office.clone(),
      config:    Arc::clone(&self.config),
      auth:      Arc::clone(&self.auth),
    }
  }
}

impl<S, N> AppState<S, N>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  /// Wire the registrar and back office around one store, which also
  /// receives the audit trail.
  pub fn new(store: Arc<S>, notifier: Arc<N>, key: SealKey, config: ServerConfig) -> Self {
    let pii = PiiCodec::new(key.clone());
    let registrar = Registrar::new(
      Arc::clone(&store),
      Arc::clone(&notifier),
      Arc::clone(&store),
      pii.clone(),
      BindingSealer::new(key),
    );
    let office = Backoffice::new(Arc::clone(&store), notifier, store, pii);
    let auth = AuthConfig {
      username:      config.admin_username.clone(),
      password_hash: config.admin_password_hash.clone(),
    };

    Self {
      registrar,
      office,
      config: Arc::new(config),
      auth: Arc::new(auth),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build an axum [`Router`] for the warranty server.
pub fn router<S, N>(state: AppState<S, N>) -> Router
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  Router::new()
    .route("/api/warranties/{id}/step1",                post(patient::submit_serials::<S, N>))
    .route("/api/warranties/{id}/step2",                put(patient::submit_patient::<S, N>))
    .route("/api/warranties/{id}/step3",                put(patient::confirm::<S, N>))
    .route("/api/warranties/{id}/status",               get(patient::status::<S, N>))
    .route("/api/warranties/{id}/draft",                get(patient::draft::<S, N>))
    .route("/api/serials/check",                        get(patient::check_serial::<S, N>))
    .route("/api/admin/warranties",                     get(admin::list::<S, N>))
    .route("/api/admin/warranties/batch",               post(admin::batch_create::<S, N>))
    .route("/api/admin/warranties/expire",              post(admin::expire::<S, N>))
    .route("/api/admin/warranties/{id}",                get(admin::show::<S, N>))
    .route("/api/admin/warranties/{id}/resend-email",   post(admin::resend_email::<S, N>))
    .route("/api/admin/products",                       post(admin::add_product::<S, N>))
    .route("/api/admin/serials",                        post(admin::add_serial::<S, N>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests;
