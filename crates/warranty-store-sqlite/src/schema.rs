//! SQL schema for the warranty SQLite store.
//!
//! Executed once at connection startup. Later migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS products (
    product_id     TEXT PRIMARY KEY,
    model_number   TEXT NOT NULL,
    brand          TEXT NOT NULL,
    type           TEXT NOT NULL,
    size           TEXT,
    warranty_years INTEGER NOT NULL,   -- -1 lifetime, 0 none, N years
    description    TEXT,
    is_active      INTEGER NOT NULL DEFAULT 1,
    created_at     TEXT NOT NULL,
    deleted_at     TEXT
);

CREATE TABLE IF NOT EXISTS serials (
    serial_id          TEXT PRIMARY KEY,
    serial_number      TEXT NOT NULL UNIQUE,
    full_serial_number TEXT,
    product_id         TEXT NOT NULL REFERENCES products(product_id),
    created_at         TEXT NOT NULL,
    deleted_at         TEXT
);

CREATE TABLE IF NOT EXISTS warranty_registrations (
    warranty_id             TEXT PRIMARY KEY,
    step                    INTEGER NOT NULL DEFAULT 0,
    serial_number           TEXT,
    serial_number_2         TEXT,
    product_id              TEXT REFERENCES products(product_id),
    product_id_2            TEXT REFERENCES products(product_id),
    warranty_years          INTEGER,
    patient_name            TEXT,
    patient_birth_date      TEXT,
    patient_id_sealed       TEXT,   -- PII codec ciphertext
    patient_phone_sealed    TEXT,   -- PII codec ciphertext
    patient_email           TEXT,
    hospital_name           TEXT,
    doctor_name             TEXT,
    surgery_date            TEXT,
    warranty_start_date     TEXT,
    warranty_end_date       TEXT,
    status                  TEXT,
    confirmation_email_sent INTEGER NOT NULL DEFAULT 0,
    email_sent_at           TEXT,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL
);

-- One row per bound serial. The primary key is what stops two records from
-- holding the same serial; rows are only ever inserted.
CREATE TABLE IF NOT EXISTS serial_claims (
    serial_number TEXT PRIMARY KEY,
    warranty_id   TEXT NOT NULL REFERENCES warranty_registrations(warranty_id),
    claimed_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_logs (
    audit_id    TEXT PRIMARY KEY,
    user_name   TEXT,
    action      TEXT NOT NULL,      -- 'CREATE' | 'UPDATE' | 'DELETE'
    entity      TEXT NOT NULL,
    entity_id   TEXT,
    before_json TEXT,
    after_json  TEXT,
    ip_address  TEXT,
    user_agent  TEXT,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS registrations_created_idx ON warranty_registrations(created_at);
CREATE INDEX IF NOT EXISTS registrations_status_idx  ON warranty_registrations(status, warranty_end_date);
CREATE INDEX IF NOT EXISTS audit_entity_idx          ON audit_logs(entity, entity_id);

PRAGMA user_version = 1;
";
