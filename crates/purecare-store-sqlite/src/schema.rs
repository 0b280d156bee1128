//! SQL schema for the purecare SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS purifiers (
    purifier_id   TEXT PRIMARY KEY,
    owner_id      TEXT NOT NULL,
    model         TEXT NOT NULL,
    serial_number TEXT NOT NULL,
    location      TEXT NOT NULL,
    installed_at  TEXT NOT NULL    -- RFC 3339 UTC
);

-- Exactly eight rows per purifier, written together with the purifier.
-- Due dates are not stored: they are derived from installed_at + lifespan.
CREATE TABLE IF NOT EXISTS consumables (
    purifier_id    TEXT NOT NULL REFERENCES purifiers(purifier_id),
    slot           TEXT NOT NULL,  -- 'filter1' .. 'filter7' | 'filterRO'
    kind           TEXT NOT NULL,
    lifespan_value REAL NOT NULL CHECK (lifespan_value > 0),
    lifespan_unit  TEXT NOT NULL,  -- 'day' | 'month' | 'year'
    installed_at   TEXT NOT NULL,
    status         TEXT NOT NULL,  -- 'active' | 'needs_replacement' | 'replaced'
    PRIMARY KEY (purifier_id, slot)
);

-- Replacement history; append-only.
CREATE TABLE IF NOT EXISTS maintenance_records (
    record_id             TEXT PRIMARY KEY,
    purifier_id           TEXT NOT NULL REFERENCES purifiers(purifier_id),
    slot                  TEXT NOT NULL,
    previous_installed_at TEXT NOT NULL,
    previous_status       TEXT NOT NULL,
    installed_at          TEXT NOT NULL,
    recorded_at           TEXT NOT NULL,
    notes                 TEXT
);

CREATE INDEX IF NOT EXISTS purifiers_owner_idx    ON purifiers(owner_id);
CREATE INDEX IF NOT EXISTS maintenance_purifier_idx
    ON maintenance_records(purifier_id, recorded_at);

PRAGMA user_version = 1;
";
