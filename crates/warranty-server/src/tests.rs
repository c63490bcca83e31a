use std::{path::PathBuf, sync::Arc};

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use rand_core::OsRng;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;
use warranty_core::NoopNotifier;
use warranty_seal::SealKey;
use warranty_store_sqlite::SqliteStore;

use super::*;

async fn app() -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(b"secret", &salt)
    .unwrap()
    .to_string();

  let config = ServerConfig {
    host:                "127.0.0.1".to_string(),
    port:                8080,
    store_path:          PathBuf::from(":memory:"),
    encryption_key:      "00".repeat(32),
    admin_username:      "admin".to_string(),
    admin_password_hash: hash,
    cookie_secure:       true,
    mailgun:             None,
  };
  let key = SealKey::from_bytes(&[7u8; 32]).unwrap();
  router(AppState::new(Arc::new(store), Arc::new(NoopNotifier), key, config))
}

fn admin_auth() -> String { format!("Basic {}", B64.encode("admin:secret")) }

async fn call(
  app: &Router,
  method: &str,
  uri: &str,
  headers: Vec<(header::HeaderName, String)>,
  body: Option<Value>,
) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  for (k, v) in headers {
    builder = builder.header(k, v);
  }
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn admin(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
  call(app, method, uri, vec![(header::AUTHORIZATION, admin_auth())], body).await
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

/// `name=value` from the response's `Set-Cookie`, ready for a `Cookie` header.
fn cookie_pair(resp: &Response) -> String {
  let raw = resp
    .headers()
    .get(header::SET_COOKIE)
    .expect("set-cookie")
    .to_str()
    .unwrap();
  raw.split(';').next().unwrap().to_string()
}

/// Seed one product with a stocked serial and one blank record.
async fn seed(app: &Router, serial: &str) -> Uuid {
  let resp = admin(
    app,
    "POST",
    "/api/admin/products",
    Some(json!({
      "model_number": "RM-350",
      "brand": "Acme Implants",
      "type": "round",
      "size": "350cc",
      "warranty_years": 5,
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let product_id = json_body(resp).await["product_id"].as_str().unwrap().to_string();

  let resp = admin(
    app,
    "POST",
    "/api/admin/serials",
    Some(json!({ "serial_number": serial, "product_id": product_id })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);

  blank(app).await
}

async fn blank(app: &Router) -> Uuid {
  let resp = admin(app, "POST", "/api/admin/warranties/batch", Some(json!({ "count": 1 }))).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let body = json_body(resp).await;
  body["ids"][0].as_str().unwrap().parse().unwrap()
}

fn serials(serial: &str) -> Value {
  json!({ "serial_number": serial, "surgery_date": "2024-01-01" })
}

fn patient() -> Value {
  json!({
    "patient_name": "王小明",
    "patient_id": "A123456789",
    "is_domestic_identity": true,
    "patient_birth_date": "1990-05-17",
    "patient_phone": "0912345678",
    "patient_email": "patient@example.com",
    "hospital_name": "Taipei General",
    "doctor_name": "Dr. Lin",
  })
}

// ─── Patient flow ────────────────────────────────────────────────────────────

#[tokio::test]
async fn registration_over_http() {
  let app = app().await;
  let id = seed(&app, "1234567-001").await;

  let resp = call(&app, "POST", &format!("/api/warranties/{id}/step1"), vec![], Some(serials("1234567-001"))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let set = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
  assert!(set.contains("HttpOnly"));
  assert!(set.contains("SameSite=None; Secure"));
  let cookie = cookie_pair(&resp);
  let body = json_body(resp).await;
  assert_eq!(body["step"], 1);
  assert_eq!(body["warranty_end_date"], "2029-01-01");
  assert_eq!(body["warranty_years"], 5);

  let resp = call(
    &app,
    "PUT",
    &format!("/api/warranties/{id}/step2"),
    vec![(header::COOKIE, cookie)],
    Some(patient()),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let cookie = cookie_pair(&resp);
  assert_eq!(json_body(resp).await["step"], 2);

  let resp = call(&app, "PUT", &format!("/api/warranties/{id}/step3"), vec![(header::COOKIE, cookie)], None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let set = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
  assert!(set.contains("Max-Age=0"));
  let body = json_body(resp).await;
  assert_eq!(body["step"], 3);
  assert_eq!(body["status"], "active");

  let resp = call(&app, "GET", &format!("/api/warranties/{id}/status"), vec![], None).await;
  assert_eq!(json_body(resp).await["step"], 3);
}

#[tokio::test]
async fn replayed_steps_after_establishment_are_409() {
  let app = app().await;
  let id = seed(&app, "1234567-001").await;

  let resp = call(&app, "POST", &format!("/api/warranties/{id}/step1"), vec![], Some(serials("1234567-001"))).await;
  let cookie = cookie_pair(&resp);
  let resp = call(&app, "PUT", &format!("/api/warranties/{id}/step2"), vec![(header::COOKIE, cookie)], Some(patient())).await;
  let cookie = cookie_pair(&resp);
  let resp = call(&app, "PUT", &format!("/api/warranties/{id}/step3"), vec![(header::COOKIE, cookie.clone())], None).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let resp = call(&app, "PUT", &format!("/api/warranties/{id}/step3"), vec![(header::COOKIE, cookie.clone())], None).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  assert_eq!(json_body(resp).await["code"], "cannot_be_confirmed");

  let resp = call(&app, "PUT", &format!("/api/warranties/{id}/step2"), vec![(header::COOKIE, cookie)], Some(patient())).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  assert_eq!(json_body(resp).await["code"], "cannot_be_filled");
}

#[tokio::test]
async fn later_steps_need_the_cookie() {
  let app = app().await;
  let id = seed(&app, "1234567-001").await;

  let resp = call(&app, "POST", &format!("/api/warranties/{id}/step1"), vec![], Some(serials("1234567-001"))).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let resp = call(&app, "PUT", &format!("/api/warranties/{id}/step2"), vec![], Some(patient())).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  let forged = (header::COOKIE, "warranty_step=bm90LWEtdG9rZW4=".to_string());
  let resp = call(&app, "GET", &format!("/api/warranties/{id}/draft"), vec![forged], None).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn draft_omits_sealed_fields() {
  let app = app().await;
  let id = seed(&app, "1234567-001").await;

  let resp = call(&app, "POST", &format!("/api/warranties/{id}/step1"), vec![], Some(serials("1234567-001"))).await;
  let cookie = cookie_pair(&resp);
  let resp = call(&app, "PUT", &format!("/api/warranties/{id}/step2"), vec![(header::COOKIE, cookie)], Some(patient())).await;
  let cookie = cookie_pair(&resp);

  let resp = call(&app, "GET", &format!("/api/warranties/{id}/draft"), vec![(header::COOKIE, cookie)], None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["patient_name"], "王小明");
  assert!(body.get("patient_id").is_none());
  assert!(body.get("patient_phone").is_none());
}

#[tokio::test]
async fn step1_errors_carry_codes() {
  let app = app().await;
  let id = seed(&app, "1234567-001").await;

  let resp = call(&app, "POST", &format!("/api/warranties/{id}/step1"), vec![], Some(serials("12345"))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(json_body(resp).await["code"], "serial_format");

  let resp = call(&app, "POST", &format!("/api/warranties/{id}/step1"), vec![], Some(serials("7654321-001"))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(json_body(resp).await["code"], "serial_not_found");

  let resp = call(&app, "POST", &format!("/api/warranties/{id}/step1"), vec![], Some(serials("1234567-001"))).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let resp = call(&app, "POST", &format!("/api/warranties/{id}/step1"), vec![], Some(serials("1234567-001"))).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  assert_eq!(json_body(resp).await["code"], "already_filled");
}

#[tokio::test]
async fn patient_validation_lists_fields() {
  let app = app().await;
  let id = seed(&app, "1234567-001").await;

  let resp = call(&app, "POST", &format!("/api/warranties/{id}/step1"), vec![], Some(serials("1234567-001"))).await;
  let cookie = cookie_pair(&resp);

  let mut bad = patient();
  bad["patient_id"] = json!("A123456788");
  bad["patient_email"] = json!("not-an-email");
  let resp = call(&app, "PUT", &format!("/api/warranties/{id}/step2"), vec![(header::COOKIE, cookie)], Some(bad)).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = json_body(resp).await;
  assert_eq!(body["code"], "validation");
  assert!(body["fields"].get("patient_id").is_some());
  assert!(body["fields"].get("patient_email").is_some());
}

#[tokio::test]
async fn unknown_record_is_404() {
  let app = app().await;
  let resp = call(&app, "GET", &format!("/api/warranties/{}/status", Uuid::new_v4()), vec![], None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn serial_check_answers() {
  let app = app().await;
  let first = seed(&app, "1234567-001").await;
  let second = blank(&app).await;

  let uri = |id: Uuid, serial: &str| format!("/api/serials/check?warranty_id={id}&serial_number={serial}");

  let resp = call(&app, "GET", &uri(second, "1234567-001"), vec![], None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["exists"], true);

  let resp = call(&app, "GET", &uri(second, "9999999-999"), vec![], None).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  let resp = call(&app, "GET", &uri(Uuid::new_v4(), "1234567-001"), vec![], None).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  let resp = call(&app, "POST", &format!("/api/warranties/{first}/step1"), vec![], Some(serials("1234567-001"))).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let resp = call(&app, "GET", &uri(second, "1234567-001"), vec![], None).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);

  let resp = call(&app, "GET", &uri(first, "1234567-001"), vec![], None).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// ─── Back office ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_requires_credentials() {
  let app = app().await;
  let resp = call(&app, "GET", "/api/admin/warranties", vec![], None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

  let wrong = format!("Basic {}", B64.encode("admin:wrong"));
  let resp = call(&app, "POST", "/api/admin/warranties/expire", vec![(header::AUTHORIZATION, wrong)], None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn batch_bounds() {
  let app = app().await;
  for count in [0, 101] {
    let resp = admin(&app, "POST", "/api/admin/warranties/batch", Some(json!({ "count": count }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }
  let resp = admin(&app, "POST", "/api/admin/warranties/batch", Some(json!({ "count": 3 }))).await;
  let body = json_body(resp).await;
  assert_eq!(body["count"], 3);
  assert_eq!(body["ids"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn admin_sees_decrypted_record() {
  let app = app().await;
  let id = seed(&app, "1234567-001").await;

  let resp = call(&app, "POST", &format!("/api/warranties/{id}/step1"), vec![], Some(serials("1234567-001"))).await;
  let cookie = cookie_pair(&resp);
  call(&app, "PUT", &format!("/api/warranties/{id}/step2"), vec![(header::COOKIE, cookie)], Some(patient())).await;

  let resp = admin(&app, "GET", &format!("/api/admin/warranties/{id}"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["patient_id"], "A123456789");
  assert_eq!(body["patient_phone"], "0912345678");

  let resp = admin(&app, "GET", "/api/admin/warranties?limit=10", None).await;
  let list = json_body(resp).await;
  assert_eq!(list.as_array().unwrap().len(), 1);
  assert!(list[0].get("patient_id").is_none());
}
