//! Audit trail of record mutations.

use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

/// Table name recorded against warranty record entries.
pub const WARRANTY_ENTITY: &str = "warranty_registrations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
  Create,
  Update,
}

impl AuditAction {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Create => "CREATE",
      Self::Update => "UPDATE",
    }
  }
}

/// Who made a request. Anonymous patients carry only network details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
  pub user:       Option<String>,
  pub ip:         Option<String>,
  pub user_agent: Option<String>,
}

impl Actor {
  pub fn staff(user: impl Into<String>) -> Self {
    Self { user: Some(user.into()), ..Self::default() }
  }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
  pub actor:     Actor,
  pub action:    AuditAction,
  pub entity:    &'static str,
  pub entity_id: Option<Uuid>,
  pub before:    Option<serde_json::Value>,
  pub after:     Option<serde_json::Value>,
}

impl AuditEntry {
  pub fn new(actor: &Actor, action: AuditAction, entity: &'static str) -> Self {
    Self {
      actor: actor.clone(),
      action,
      entity,
      entity_id: None,
      before: None,
      after: None,
    }
  }

  pub fn id(mut self, id: Uuid) -> Self {
    self.entity_id = Some(id);
    self
  }

  /// Snapshot `value` as the prior state. Serialisation failures leave it
  /// empty.
  pub fn before(mut self, value: &impl Serialize) -> Self {
    self.before = serde_json::to_value(value).ok();
    self
  }

  pub fn after(mut self, value: &impl Serialize) -> Self {
    self.after = serde_json::to_value(value).ok();
    self
  }
}

/// Destination for audit entries.
pub trait AuditSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn record(
    &self,
    entry: AuditEntry,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// Write `entry`; failure is logged and never reaches the caller.
pub(crate) async fn log_entry<A: AuditSink>(sink: &A, entry: AuditEntry) {
  let action = entry.action.as_str();
  let id = entry.entity_id;
  if let Err(e) = sink.record(entry).await {
    tracing::warn!(action, entity_id = ?id, error = %e, "audit write failed");
  }
}
