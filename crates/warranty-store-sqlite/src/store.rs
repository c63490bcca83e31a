//! [`SqliteStore`]: the SQLite implementation of [`WarrantyStore`] and
//! [`AuditSink`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use warranty_core::{
  audit::{AuditEntry, AuditSink},
  model::{NewProduct, NewSerial, Product, Serial, Step, WarrantyRecord},
  store::{WarrantyStore, WriteOutcome},
};

use crate::{
  Error, Result,
  encode::{
    PRODUCT_COLUMNS, RECORD_COLUMNS, RawProduct, RawRecord, RawSerial,
    SERIAL_COLUMNS, decode_uuid, encode_date, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

/// What the commit transaction saw, before the record is re-read.
enum Committed {
  Applied,
  StepMismatch,
  SerialTaken(String),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A warranty store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Number of audit entries written for `entity_id`.
  #[cfg(test)]
  pub(crate) async fn audit_count(&self, entity_id: Uuid) -> Result<usize> {
    let id_str = encode_uuid(entity_id);
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM audit_logs WHERE entity_id = ?1",
          rusqlite::params![id_str],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(usize::try_from(n).unwrap_or(0))
  }
}

// ─── WarrantyStore impl ──────────────────────────────────────────────────────

impl WarrantyStore for SqliteStore {
  type Error = Error;

  // ── Inventory ─────────────────────────────────────────────────────────────

  async fn add_product(&self, input: NewProduct) -> Result<Product> {
    let product = Product {
      product_id:     Uuid::new_v4(),
      model_number:   input.model_number,
      brand:          input.brand,
      kind:           input.kind,
      size:           input.size,
      warranty_years: input.warranty_years,
      description:    input.description,
      is_active:      input.is_active,
      created_at:     Utc::now(),
      deleted_at:     None,
    };

    let id_str      = encode_uuid(product.product_id);
    let model       = product.model_number.clone();
    let brand       = product.brand.clone();
    let kind        = product.kind.clone();
    let size        = product.size.clone();
    let years       = product.warranty_years.code();
    let description = product.description.clone();
    let is_active   = product.is_active;
    let created     = encode_dt(product.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO products (
             product_id, model_number, brand, type, size,
             warranty_years, description, is_active, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str, model, brand, kind, size, years, description, is_active,
            created,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(product)
  }

  async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawProduct> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ?1"),
            rusqlite::params![id_str],
            RawProduct::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProduct::into_product).transpose()
  }

  async fn add_serial(&self, input: NewSerial) -> Result<Serial> {
    let serial = Serial {
      serial_id:          Uuid::new_v4(),
      serial_number:      input.serial_number,
      full_serial_number: input.full_serial_number,
      product_id:         input.product_id,
      created_at:         Utc::now(),
      deleted_at:         None,
    };

    let id_str      = encode_uuid(serial.serial_id);
    let number      = serial.serial_number.clone();
    let full        = serial.full_serial_number.clone();
    let product_str = encode_uuid(serial.product_id);
    let created     = encode_dt(serial.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO serials (
             serial_id, serial_number, full_serial_number, product_id, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, number, full, product_str, created],
        )?;
        Ok(())
      })
      .await?;

    Ok(serial)
  }

  async fn find_serial(&self, serial_number: &str) -> Result<Option<Serial>> {
    let number = serial_number.to_owned();

    let raw: Option<RawSerial> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {SERIAL_COLUMNS} FROM serials
               WHERE serial_number = ?1 AND deleted_at IS NULL"
            ),
            rusqlite::params![number],
            RawSerial::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSerial::into_serial).transpose()
  }

  async fn is_serial_claimed(&self, serial_number: &str) -> Result<bool> {
    let number = serial_number.to_owned();

    let claimed = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM serial_claims WHERE serial_number = ?1",
            rusqlite::params![number],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;

    Ok(claimed)
  }

  // ── Records ───────────────────────────────────────────────────────────────

  async fn create_blank_records(&self, count: usize) -> Result<Vec<WarrantyRecord>> {
    let now = Utc::now();
    let records: Vec<WarrantyRecord> = (0..count)
      .map(|_| WarrantyRecord::blank(Uuid::new_v4(), now))
      .collect();

    let rows: Vec<(String, String)> = records
      .iter()
      .map(|r| (encode_uuid(r.warranty_id), encode_dt(r.created_at)))
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO warranty_registrations (warranty_id, step, created_at, updated_at)
             VALUES (?1, 0, ?2, ?2)",
          )?;
          for (id, at) in &rows {
            stmt.execute(rusqlite::params![id, at])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(records)
  }

  async fn get_record(&self, id: Uuid) -> Result<Option<WarrantyRecord>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {RECORD_COLUMNS} FROM warranty_registrations WHERE warranty_id = ?1"
            ),
            rusqlite::params![id_str],
            RawRecord::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn list_registered(
    &self,
    limit: usize,
    offset: usize,
  ) -> Result<Vec<WarrantyRecord>> {
    let limit_val  = i64::try_from(limit).unwrap_or(i64::MAX);
    let offset_val = i64::try_from(offset).unwrap_or(i64::MAX);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECORD_COLUMNS} FROM warranty_registrations
           WHERE updated_at != created_at
           ORDER BY created_at DESC
           LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val, offset_val], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn commit(&self, record: WarrantyRecord, expected: Step) -> Result<WriteOutcome> {
    let id = record.warranty_id;
    let id_str = encode_uuid(id);
    let now = encode_dt(Utc::now());
    let serials: Vec<String> = record.serials().map(str::to_owned).collect();

    let step          = i64::from(record.step.code());
    let expected      = i64::from(expected.code());
    let serial_1      = record.serial_number.clone();
    let serial_2      = record.serial_number_2.clone();
    let product_1     = record.product_id.map(encode_uuid);
    let product_2     = record.product_id_2.map(encode_uuid);
    let years         = record.warranty_years.map(|y| y.code());
    let name          = record.patient_name.clone();
    let birth         = record.patient_birth_date.map(encode_date);
    let id_sealed     = record.patient_id_sealed.clone();
    let phone_sealed  = record.patient_phone_sealed.clone();
    let email         = record.patient_email.clone();
    let hospital      = record.hospital_name.clone();
    let doctor        = record.doctor_name.clone();
    let surgery       = record.surgery_date.map(encode_date);
    let start         = record.warranty_start_date.map(encode_date);
    let end           = record.warranty_end_date.map(encode_date);
    let status        = record.status.map(|s| s.as_str());
    let email_sent    = record.confirmation_email_sent;
    let email_sent_at = record.email_sent_at.map(encode_dt);

    let committed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let changed = tx.execute(
          "UPDATE warranty_registrations SET
             step = :step,
             serial_number = :serial_1,
             serial_number_2 = :serial_2,
             product_id = :product_1,
             product_id_2 = :product_2,
             warranty_years = :years,
             patient_name = :name,
             patient_birth_date = :birth,
             patient_id_sealed = :id_sealed,
             patient_phone_sealed = :phone_sealed,
             patient_email = :email,
             hospital_name = :hospital,
             doctor_name = :doctor,
             surgery_date = :surgery,
             warranty_start_date = :start,
             warranty_end_date = :end,
             status = :status,
             confirmation_email_sent = :email_sent,
             email_sent_at = :email_sent_at,
             updated_at = :now
           WHERE warranty_id = :id AND step = :expected",
          rusqlite::named_params! {
            ":step": step,
            ":serial_1": serial_1,
            ":serial_2": serial_2,
            ":product_1": product_1,
            ":product_2": product_2,
            ":years": years,
            ":name": name,
            ":birth": birth,
            ":id_sealed": id_sealed,
            ":phone_sealed": phone_sealed,
            ":email": email,
            ":hospital": hospital,
            ":doctor": doctor,
            ":surgery": surgery,
            ":start": start,
            ":end": end,
            ":status": status,
            ":email_sent": email_sent,
            ":email_sent_at": email_sent_at,
            ":now": now,
            ":id": id_str,
            ":expected": expected,
          },
        )?;
        if changed == 0 {
          return Ok(Committed::StepMismatch);
        }

        // Dropping `tx` without committing rolls the update back.
        for serial in &serials {
          tx.execute(
            "INSERT OR IGNORE INTO serial_claims (serial_number, warranty_id, claimed_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![serial, id_str, now],
          )?;
          let owner: String = tx.query_row(
            "SELECT warranty_id FROM serial_claims WHERE serial_number = ?1",
            rusqlite::params![serial],
            |r| r.get(0),
          )?;
          if owner != id_str {
            return Ok(Committed::SerialTaken(serial.clone()));
          }
        }

        tx.commit()?;
        Ok(Committed::Applied)
      })
      .await?;

    match committed {
      Committed::StepMismatch => Ok(WriteOutcome::StepMismatch),
      Committed::SerialTaken(s) => {
        tracing::debug!(warranty_id = %id, serial = %s, "serial already claimed");
        Ok(WriteOutcome::SerialTaken(s))
      }
      Committed::Applied => {
        let stored = self
          .get_record(id)
          .await?
          .ok_or_else(|| Error::Decode(format!("record {id} vanished after commit")))?;
        Ok(WriteOutcome::Applied(stored))
      }
    }
  }

  async fn mark_email_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE warranty_registrations
           SET confirmation_email_sent = 1, email_sent_at = ?2, updated_at = ?2
           WHERE warranty_id = ?1",
          rusqlite::params![id_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn expire_lapsed(&self, today: NaiveDate) -> Result<Vec<Uuid>> {
    let today_str = encode_date(today);
    let now = encode_dt(Utc::now());

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let ids = {
          let mut stmt = tx.prepare(
            "SELECT warranty_id FROM warranty_registrations
             WHERE status = 'active'
               AND warranty_end_date < ?1
               AND (warranty_years IS NULL OR warranty_years != -1)",
          )?;
          stmt
            .query_map(rusqlite::params![today_str], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        {
          let mut stmt = tx.prepare(
            "UPDATE warranty_registrations
             SET status = 'expired', updated_at = ?2
             WHERE warranty_id = ?1",
          )?;
          for id in &ids {
            stmt.execute(rusqlite::params![id, now])?;
          }
        }
        tx.commit()?;
        Ok(ids)
      })
      .await?;

    ids.iter().map(|s| decode_uuid(s)).collect()
  }
}

// ─── AuditSink impl ──────────────────────────────────────────────────────────

impl AuditSink for SqliteStore {
  type Error = Error;

  async fn record(&self, entry: AuditEntry) -> Result<()> {
    let audit_id   = encode_uuid(Uuid::new_v4());
    let user       = entry.actor.user;
    let action     = entry.action.as_str();
    let entity     = entry.entity;
    let entity_id  = entry.entity_id.map(encode_uuid);
    let before     = entry.before.map(|v| v.to_string());
    let after      = entry.after.map(|v| v.to_string());
    let ip         = entry.actor.ip;
    let user_agent = entry.actor.user_agent;
    let created    = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_logs (
             audit_id, user_name, action, entity, entity_id,
             before_json, after_json, ip_address, user_agent, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            audit_id, user, action, entity, entity_id, before, after, ip,
            user_agent, created,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
