//! The `PurifierStore` trait — the persistence collaborator.
//!
//! Implemented by storage backends (e.g. `purecare-store-sqlite`). The engine
//! and the API depend on this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  consumable::Consumable,
  purifier::{MaintenanceRecord, NewPurifier, Purifier},
  slot::Slot,
};

/// Abstraction over a purifier store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait PurifierStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Purifiers ─────────────────────────────────────────────────────────

  /// Persist a new purifier with all eight consumables and return it.
  /// The `purifier_id` is assigned by the store.
  fn add_purifier(
    &self,
    input: NewPurifier,
  ) -> impl Future<Output = Result<Purifier, Self::Error>> + Send + '_;

  /// Retrieve a purifier by UUID. Returns `None` if not found.
  fn get_purifier(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Purifier>, Self::Error>> + Send + '_;

  /// List all purifiers, optionally restricted to one owner.
  fn list_purifiers(
    &self,
    owner_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<Purifier>, Self::Error>> + Send + '_;

  // ── Consumables ───────────────────────────────────────────────────────

  /// Overwrite the persisted state of one slot (status writes from sweeps).
  fn save_consumable<'a>(
    &'a self,
    purifier_id: Uuid,
    slot: Slot,
    consumable: &'a Consumable,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Maintenance history ───────────────────────────────────────────────

  /// Persist a replacement: overwrite the slot with `consumable` and append
  /// `record`, atomically. Either both writes land or neither does.
  fn record_replacement<'a>(
    &'a self,
    record: &'a MaintenanceRecord,
    consumable: &'a Consumable,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// All maintenance records for a purifier, oldest first.
  fn maintenance_history(
    &self,
    purifier_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MaintenanceRecord>, Self::Error>> + Send + '_;
}
