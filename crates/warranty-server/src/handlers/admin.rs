//! Back-office endpoints. Every handler requires [`Staff`] credentials.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;
use warranty_core::{
  AuditSink, DecryptedRecord, Notifier, WarrantyRecord, WarrantyStore,
  model::{NewProduct, NewSerial, Product, Serial},
};

use crate::{AppState, auth::Staff, error::Error};

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
  pub count: usize,
}

pub async fn batch_create<S, N>(
  State(state): State<AppState<S, N>>,
  Staff(actor): Staff,
  Json(req): Json<BatchRequest>,
) -> Result<(StatusCode, Json<Value>), Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  let records = state.office.batch_create(req.count, &actor).await?;
  let ids: Vec<Uuid> = records.iter().map(|r| r.warranty_id).collect();
  Ok((StatusCode::CREATED, Json(json!({ "count": ids.len(), "ids": ids }))))
}

#[derive(Debug, Default, Deserialize)]
pub struct Page {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

pub async fn list<S, N>(
  State(state): State<AppState<S, N>>,
  Staff(_): Staff,
  Query(page): Query<Page>,
) -> Result<Json<Vec<WarrantyRecord>>, Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  let records = state.office.list_registered(page.limit, page.offset).await?;
  Ok(Json(records))
}

pub async fn show<S, N>(
  State(state): State<AppState<S, N>>,
  Staff(_): Staff,
  Path(id): Path<Uuid>,
) -> Result<Json<DecryptedRecord>, Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  Ok(Json(state.office.get_decrypted(id).await?))
}

pub async fn resend_email<S, N>(
  State(state): State<AppState<S, N>>,
  Staff(actor): Staff,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  state.office.resend_confirmation(id, &actor).await?;
  Ok(Json(json!({ "warranty_id": id, "sent": true })))
}

pub async fn expire<S, N>(
  State(state): State<AppState<S, N>>,
  Staff(actor): Staff,
) -> Result<Json<Value>, Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  let ids = state.office.expire_lapsed(&actor).await?;
  Ok(Json(json!({ "expired": ids.len(), "ids": ids })))
}

pub async fn add_product<S, N>(
  State(state): State<AppState<S, N>>,
  Staff(actor): Staff,
  Json(input): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  let product = state.office.add_product(input, &actor).await?;
  Ok((StatusCode::CREATED, Json(product)))
}

pub async fn add_serial<S, N>(
  State(state): State<AppState<S, N>>,
  Staff(actor): Staff,
  Json(input): Json<NewSerial>,
) -> Result<(StatusCode, Json<Serial>), Error>
where
  S: WarrantyStore + AuditSink + 'static,
  N: Notifier + 'static,
{
  let serial = state.office.add_serial(input, &actor).await?;
  Ok((StatusCode::CREATED, Json(serial)))
}
