//! Purifier units and their maintenance history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  catalog::LifespanCatalog,
  consumable::{ConsumableSet, Replacement},
  lifecycle::ConsumableStatus,
  slot::Slot,
};

// ─── Purifier ────────────────────────────────────────────────────────────────

/// A water-purifier unit installed at a customer site.
///
/// The purifier exclusively owns its [`ConsumableSet`]; consumables are never
/// shared between units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purifier {
  pub purifier_id:   Uuid,
  /// The customer who receives replacement notifications for this unit.
  pub owner_id:      Uuid,
  pub model:         String,
  pub serial_number: String,
  pub location:      String,
  pub installed_at:  DateTime<Utc>,
  pub consumables:   ConsumableSet,
}

// ─── NewPurifier ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::PurifierStore::add_purifier`].
/// `purifier_id` is always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewPurifier {
  pub owner_id:      Uuid,
  pub model:         String,
  pub serial_number: String,
  pub location:      String,
  pub installed_at:  DateTime<Utc>,
  pub consumables:   ConsumableSet,
}

impl NewPurifier {
  /// A purifier whose eight consumables are all installed alongside the unit.
  pub fn new(
    owner_id: Uuid,
    model: impl Into<String>,
    serial_number: impl Into<String>,
    location: impl Into<String>,
    installed_at: DateTime<Utc>,
    catalog: &LifespanCatalog,
  ) -> Result<Self> {
    Ok(Self {
      owner_id,
      model: model.into(),
      serial_number: serial_number.into(),
      location: location.into(),
      installed_at,
      consumables: ConsumableSet::install(catalog, installed_at)?,
    })
  }

  pub fn into_purifier(self, purifier_id: Uuid) -> Purifier {
    Purifier {
      purifier_id,
      owner_id: self.owner_id,
      model: self.model,
      serial_number: self.serial_number,
      location: self.location,
      installed_at: self.installed_at,
      consumables: self.consumables,
    }
  }
}

// ─── Maintenance ─────────────────────────────────────────────────────────────

/// An append-only record of one consumable replacement.
///
/// The consumable passed through `replaced` and landed in `active` when this
/// record was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
  pub record_id:             Uuid,
  pub purifier_id:           Uuid,
  pub slot:                  Slot,
  pub previous_installed_at: DateTime<Utc>,
  pub previous_status:       ConsumableStatus,
  pub installed_at:          DateTime<Utc>,
  pub recorded_at:           DateTime<Utc>,
  pub notes:                 Option<String>,
}

impl MaintenanceRecord {
  pub fn for_replacement(
    purifier_id: Uuid,
    replacement: &Replacement,
    notes: Option<String>,
  ) -> Self {
    Self {
      record_id: Uuid::new_v4(),
      purifier_id,
      slot: replacement.slot,
      previous_installed_at: replacement.previous.installed_at(),
      previous_status: replacement.previous.status(),
      installed_at: replacement.current.installed_at(),
      recorded_at: replacement.replaced_at,
      notes,
    }
  }
}
