//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, UUIDs as hyphenated lowercase
//! strings, and enums by their canonical `as_str` names.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use purecare_core::{
  consumable::{Consumable, ConsumableSet},
  lifecycle::ConsumableStatus,
  lifespan::{Lifespan, LifespanUnit},
  purifier::{MaintenanceRecord, Purifier},
  slot::Slot,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_slot(s: &str) -> Result<Slot> { Ok(s.parse()?) }

pub fn decode_status(s: &str) -> Result<ConsumableStatus> { Ok(s.parse()?) }

pub fn decode_unit(s: &str) -> Result<LifespanUnit> { Ok(s.parse()?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `purifiers` row.
pub struct RawPurifier {
  pub purifier_id:   String,
  pub owner_id:      String,
  pub model:         String,
  pub serial_number: String,
  pub location:      String,
  pub installed_at:  String,
}

/// Raw values read directly from a `consumables` row.
pub struct RawConsumable {
  pub purifier_id:    String,
  pub slot:           String,
  pub kind:           String,
  pub lifespan_value: f64,
  pub lifespan_unit:  String,
  pub installed_at:   String,
  pub status:         String,
}

/// Column values for writing one consumable row.
pub struct ConsumableRow {
  pub slot:           &'static str,
  pub kind:           String,
  pub lifespan_value: f64,
  pub lifespan_unit:  &'static str,
  pub installed_at:   String,
  pub status:         &'static str,
}

impl ConsumableRow {
  pub fn new(slot: Slot, c: &Consumable) -> Self {
    Self {
      slot:           slot.as_str(),
      kind:           c.kind().to_owned(),
      lifespan_value: c.lifespan().value(),
      lifespan_unit:  c.lifespan().unit().as_str(),
      installed_at:   encode_dt(c.installed_at()),
      status:         c.status().as_str(),
    }
  }
}

impl RawConsumable {
  pub fn into_slot(self) -> Result<(Slot, Consumable)> {
    let slot = decode_slot(&self.slot)?;
    let lifespan = Lifespan::new(self.lifespan_value, decode_unit(&self.lifespan_unit)?)?;
    let consumable = Consumable::restore(
      self.kind,
      lifespan,
      decode_dt(&self.installed_at)?,
      decode_status(&self.status)?,
    )?;
    Ok((slot, consumable))
  }
}

impl RawPurifier {
  /// Combine a purifier row with its consumable rows.
  pub fn into_purifier(self, consumables: Vec<RawConsumable>) -> Result<Purifier> {
    let purifier_id = decode_uuid(&self.purifier_id)?;

    let mut by_slot: HashMap<Slot, Consumable> = consumables
      .into_iter()
      .map(RawConsumable::into_slot)
      .collect::<Result<_>>()?;

    if let Some(slot) = Slot::ALL.into_iter().find(|s| !by_slot.contains_key(s)) {
      return Err(Error::MissingSlot { purifier_id, slot });
    }
    let consumables = ConsumableSet::try_from_fn(|slot| {
      by_slot
        .remove(&slot)
        .ok_or_else(|| purecare_core::Error::UnknownSlot(slot.to_string()))
    })?;

    Ok(Purifier {
      purifier_id,
      owner_id: decode_uuid(&self.owner_id)?,
      model: self.model,
      serial_number: self.serial_number,
      location: self.location,
      installed_at: decode_dt(&self.installed_at)?,
      consumables,
    })
  }
}

/// Raw values read directly from a `maintenance_records` row.
pub struct RawMaintenance {
  pub record_id:             String,
  pub purifier_id:           String,
  pub slot:                  String,
  pub previous_installed_at: String,
  pub previous_status:       String,
  pub installed_at:          String,
  pub recorded_at:           String,
  pub notes:                 Option<String>,
}

impl RawMaintenance {
  pub fn into_record(self) -> Result<MaintenanceRecord> {
    Ok(MaintenanceRecord {
      record_id:             decode_uuid(&self.record_id)?,
      purifier_id:           decode_uuid(&self.purifier_id)?,
      slot:                  decode_slot(&self.slot)?,
      previous_installed_at: decode_dt(&self.previous_installed_at)?,
      previous_status:       decode_status(&self.previous_status)?,
      installed_at:          decode_dt(&self.installed_at)?,
      recorded_at:           decode_dt(&self.recorded_at)?,
      notes:                 self.notes,
    })
  }
}
