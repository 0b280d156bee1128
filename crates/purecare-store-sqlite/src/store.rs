//! [`SqliteStore`] — the SQLite implementation of [`PurifierStore`].

use std::{collections::HashMap, path::Path};

use purecare_core::{
  consumable::Consumable,
  purifier::{MaintenanceRecord, NewPurifier, Purifier},
  slot::Slot,
  store::PurifierStore,
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    ConsumableRow, RawConsumable, RawMaintenance, RawPurifier, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

const PURIFIER_COLUMNS: &str =
  "purifier_id, owner_id, model, serial_number, location, installed_at";

const CONSUMABLE_COLUMNS: &str = "c.purifier_id, c.slot, c.kind, c.lifespan_value, \
                                  c.lifespan_unit, c.installed_at, c.status";

const UPDATE_CONSUMABLE: &str = "UPDATE consumables
   SET kind = ?3, lifespan_value = ?4, lifespan_unit = ?5,
       installed_at = ?6, status = ?7
 WHERE purifier_id = ?1 AND slot = ?2";

// ─── Row readers ─────────────────────────────────────────────────────────────

fn purifier_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPurifier> {
  Ok(RawPurifier {
    purifier_id:   row.get(0)?,
    owner_id:      row.get(1)?,
    model:         row.get(2)?,
    serial_number: row.get(3)?,
    location:      row.get(4)?,
    installed_at:  row.get(5)?,
  })
}

fn consumable_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawConsumable> {
  Ok(RawConsumable {
    purifier_id:    row.get(0)?,
    slot:           row.get(1)?,
    kind:           row.get(2)?,
    lifespan_value: row.get(3)?,
    lifespan_unit:  row.get(4)?,
    installed_at:   row.get(5)?,
    status:         row.get(6)?,
  })
}

/// Read purifiers (optionally one owner's) together with all their
/// consumable rows, in insertion order.
fn read_purifiers(
  conn: &Connection,
  owner: Option<&str>,
) -> rusqlite::Result<Vec<(RawPurifier, Vec<RawConsumable>)>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {PURIFIER_COLUMNS} FROM purifiers
     WHERE (?1 IS NULL OR owner_id = ?1)
     ORDER BY rowid"
  ))?;
  let purifiers = stmt
    .query_map(rusqlite::params![owner], purifier_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut stmt = conn.prepare(&format!(
    "SELECT {CONSUMABLE_COLUMNS}
     FROM consumables c
     JOIN purifiers p ON p.purifier_id = c.purifier_id
     WHERE (?1 IS NULL OR p.owner_id = ?1)"
  ))?;
  let mut by_purifier: HashMap<String, Vec<RawConsumable>> = HashMap::new();
  for raw in stmt.query_map(rusqlite::params![owner], consumable_from_row)? {
    let raw = raw?;
    by_purifier.entry(raw.purifier_id.clone()).or_default().push(raw);
  }

  Ok(
    purifiers
      .into_iter()
      .map(|p| {
        let consumables = by_purifier.remove(&p.purifier_id).unwrap_or_default();
        (p, consumables)
      })
      .collect(),
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A purifier store backed by a single SQLite file.
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

  /// Open an in-memory store — useful for testing.
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
}

// ─── PurifierStore impl ──────────────────────────────────────────────────────

impl PurifierStore for SqliteStore {
  type Error = Error;

  // ── Purifiers ─────────────────────────────────────────────────────────────

  async fn add_purifier(&self, input: NewPurifier) -> Result<Purifier> {
    let purifier = input.into_purifier(Uuid::new_v4());

    let id_str        = encode_uuid(purifier.purifier_id);
    let owner_str     = encode_uuid(purifier.owner_id);
    let model         = purifier.model.clone();
    let serial_number = purifier.serial_number.clone();
    let location      = purifier.location.clone();
    let at_str        = encode_dt(purifier.installed_at);
    let rows: Vec<ConsumableRow> = purifier
      .consumables
      .iter()
      .map(|(slot, c)| ConsumableRow::new(slot, c))
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          &format!("INSERT INTO purifiers ({PURIFIER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
          rusqlite::params![id_str, owner_str, model, serial_number, location, at_str],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO consumables (
               purifier_id, slot, kind, lifespan_value, lifespan_unit,
               installed_at, status
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              id_str,
              row.slot,
              row.kind,
              row.lifespan_value,
              row.lifespan_unit,
              row.installed_at,
              row.status,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(purifier)
  }

  async fn get_purifier(&self, id: Uuid) -> Result<Option<Purifier>> {
    let id_str = encode_uuid(id);

    let raw: Option<(RawPurifier, Vec<RawConsumable>)> = self
      .conn
      .call(move |conn| {
        let purifier = conn
          .query_row(
            &format!("SELECT {PURIFIER_COLUMNS} FROM purifiers WHERE purifier_id = ?1"),
            rusqlite::params![id_str],
            purifier_from_row,
          )
          .optional()?;
        let Some(purifier) = purifier else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(&format!(
          "SELECT {CONSUMABLE_COLUMNS} FROM consumables c WHERE c.purifier_id = ?1"
        ))?;
        let consumables = stmt
          .query_map(rusqlite::params![id_str], consumable_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some((purifier, consumables)))
      })
      .await?;

    raw.map(|(p, cs)| p.into_purifier(cs)).transpose()
  }

  async fn list_purifiers(&self, owner_id: Option<Uuid>) -> Result<Vec<Purifier>> {
    let owner_str = owner_id.map(encode_uuid);

    let raws = self
      .conn
      .call(move |conn| Ok(read_purifiers(conn, owner_str.as_deref())?))
      .await?;

    raws
      .into_iter()
      .map(|(p, cs)| p.into_purifier(cs))
      .collect()
  }

  // ── Consumables ───────────────────────────────────────────────────────────

  async fn save_consumable(
    &self,
    purifier_id: Uuid,
    slot:        Slot,
    consumable:  &Consumable,
  ) -> Result<()> {
    let id_str = encode_uuid(purifier_id);
    let row    = ConsumableRow::new(slot, consumable);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          UPDATE_CONSUMABLE,
          rusqlite::params![
            id_str,
            row.slot,
            row.kind,
            row.lifespan_value,
            row.lifespan_unit,
            row.installed_at,
            row.status,
          ],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::PurifierNotFound(purifier_id));
    }
    Ok(())
  }

  // ── Maintenance history ───────────────────────────────────────────────────

  async fn record_replacement(
    &self,
    record:     &MaintenanceRecord,
    consumable: &Consumable,
  ) -> Result<()> {
    let record_id_str   = encode_uuid(record.record_id);
    let purifier_id_str = encode_uuid(record.purifier_id);
    let prev_at_str     = encode_dt(record.previous_installed_at);
    let prev_status     = record.previous_status.as_str();
    let recorded_str    = encode_dt(record.recorded_at);
    let notes           = record.notes.clone();
    let row             = ConsumableRow::new(record.slot, consumable);

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(UPDATE_CONSUMABLE, rusqlite::params![
          purifier_id_str,
          row.slot,
          row.kind,
          row.lifespan_value,
          row.lifespan_unit,
          row.installed_at,
          row.status,
        ])?;
        if changed == 0 {
          // Dropping the transaction rolls it back.
          return Ok(0);
        }
        tx.execute(
          "INSERT INTO maintenance_records (
             record_id, purifier_id, slot, previous_installed_at,
             previous_status, installed_at, recorded_at, notes
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            record_id_str,
            purifier_id_str,
            row.slot,
            prev_at_str,
            prev_status,
            row.installed_at,
            recorded_str,
            notes,
          ],
        )?;
        tx.commit()?;
        Ok(changed)
      })
      .await?;

    if changed == 0 {
      return Err(Error::PurifierNotFound(record.purifier_id));
    }
    Ok(())
  }

  async fn maintenance_history(&self, purifier_id: Uuid) -> Result<Vec<MaintenanceRecord>> {
    let id_str = encode_uuid(purifier_id);

    let raws: Vec<RawMaintenance> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT record_id, purifier_id, slot, previous_installed_at,
                  previous_status, installed_at, recorded_at, notes
           FROM maintenance_records
           WHERE purifier_id = ?1
           ORDER BY recorded_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawMaintenance {
              record_id:             row.get(0)?,
              purifier_id:           row.get(1)?,
              slot:                  row.get(2)?,
              previous_installed_at: row.get(3)?,
              previous_status:       row.get(4)?,
              installed_at:          row.get(5)?,
              recorded_at:           row.get(6)?,
              notes:                 row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMaintenance::into_record).collect()
  }
}
