//! Patient-facing registration steps.
//!
//! Step 1 hands out the binding cookie; steps 2 and 3 and the draft read
//! require it back.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::HeaderMap,
  response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use warranty_core::{AuditSink, Notifier, PatientDetails, SerialStep, WarrantyStore};

use crate::{AppState, auth::Caller, cookie, error::Error, handlers::with_cookie};

pub async fn submit_serials<S, N>(
  State(state): State<AppState<S, N>>,
  Path(id): Path<Uuid>,
  Caller(actor): Caller,
  Json(input): Json<SerialStep>,
) -> Result<Response, Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  let advanced = state.registrar.submit_serials(id, input, &actor).await?;
  let r = &advanced.record;

  let body = Json(json!({
    "warranty_id":         r.warranty_id,
    "step":                r.step,
    "warranty_start_date": r.warranty_start_date,
    "warranty_end_date":   r.warranty_end_date,
    "warranty_years":      r.warranty_years,
  }));
  let set = advanced
    .binding
    .as_ref()
    .and_then(|t| cookie::issue(t, state.config.cookie_secure));

  Ok(with_cookie(body.into_response(), set))
}

pub async fn submit_patient<S, N>(
  State(state): State<AppState<S, N>>,
  Path(id): Path<Uuid>,
  Caller(actor): Caller,
  headers: HeaderMap,
  Json(input): Json<PatientDetails>,
) -> Result<Response, Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  let token = cookie::binding_token(&headers);
  let advanced = state
    .registrar
    .submit_patient(id, token.as_deref(), input, &actor)
    .await?;

  let body = Json(json!({
    "warranty_id": advanced.record.warranty_id,
    "step":        advanced.record.step,
  }));
  let set = advanced
    .binding
    .as_ref()
    .and_then(|t| cookie::issue(t, state.config.cookie_secure));

  Ok(with_cookie(body.into_response(), set))
}

pub async fn confirm<S, N>(
  State(state): State<AppState<S, N>>,
  Path(id): Path<Uuid>,
  Caller(actor): Caller,
  headers: HeaderMap,
) -> Result<Response, Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  let token = cookie::binding_token(&headers);
  let record = state.registrar.confirm(id, token.as_deref(), &actor).await?;

  let body = Json(json!({
    "warranty_id":       record.warranty_id,
    "step":              record.step,
    "status":            record.status,
    "warranty_end_date": record.warranty_end_date,
  }));
  let clear = cookie::clear(state.config.cookie_secure);

  Ok(with_cookie(body.into_response(), Some(clear)))
}

pub async fn status<S, N>(
  State(state): State<AppState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  let step = state.registrar.status(id).await?;
  Ok(Json(json!({ "warranty_id": id, "step": step })))
}

pub async fn draft<S, N>(
  State(state): State<AppState<S, N>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
) -> Result<Response, Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  let token = cookie::binding_token(&headers);
  let record = state.registrar.draft(id, token.as_deref()).await?;
  Ok(Json(record).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SerialQuery {
  pub warranty_id:   Uuid,
  pub serial_number: String,
}

pub async fn check_serial<S, N>(
  State(state): State<AppState<S, N>>,
  Query(q): Query<SerialQuery>,
) -> Result<Json<serde_json::Value>, Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  let product_id = state
    .registrar
    .check_serial(q.warranty_id, &q.serial_number)
    .await?;
  Ok(Json(json!({ "exists": true, "product_id": product_id })))
}
