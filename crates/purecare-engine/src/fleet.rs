//! The in-memory fleet of purifiers and its per-purifier locking.
//!
//! Every purifier lives behind its own `tokio::sync::Mutex` together with its
//! [`NotificationRecord`]. Sweeps and replacements both take that lock, so
//! they are mutually exclusive on one purifier and independent across
//! purifiers. The registry lock only guards membership and is never held
//! across an `.await`.

use std::{
  collections::HashMap,
  sync::{Arc, PoisonError, RwLock},
};

use chrono::{DateTime, Utc};
use purecare_core::{
  consumable::Replacement,
  purifier::{MaintenanceRecord, NewPurifier, Purifier},
  slot::Slot,
  store::PurifierStore,
};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::{Error, Result, record::NotificationRecord};

/// One purifier and the dedup state the dispatcher keeps for it.
#[derive(Debug)]
pub(crate) struct FleetEntry {
  pub purifier: Purifier,
  pub record:   NotificationRecord,
  /// Slots whose in-memory status has not reached the store yet.
  pub unsaved:  [bool; Slot::COUNT],
}

pub(crate) type SharedEntry = Arc<Mutex<FleetEntry>>;

#[derive(Default)]
struct Registry {
  /// Insertion order; sweeps walk purifiers in this order.
  order:   Vec<Uuid>,
  entries: HashMap<Uuid, SharedEntry>,
}

impl Registry {
  fn insert(&mut self, purifier: Purifier) {
    let record = NotificationRecord::primed(&purifier.consumables);
    let id = purifier.purifier_id;
    let entry = Arc::new(Mutex::new(FleetEntry {
      purifier,
      record,
      unsaved: [false; Slot::COUNT],
    }));
    if self.entries.insert(id, entry).is_none() {
      self.order.push(id);
    }
  }
}

// ─── Fleet ───────────────────────────────────────────────────────────────────

/// All purifiers known to the engine, backed by a [`PurifierStore`].
pub struct Fleet<S> {
  store:    Arc<S>,
  registry: RwLock<Registry>,
}

impl<S: PurifierStore> Fleet<S> {
  /// Load every purifier from `store`.
  ///
  /// Slots already persisted as `needs_replacement` are treated as notified.
  pub async fn load(store: Arc<S>) -> Result<Self> {
    let purifiers = store.list_purifiers(None).await.map_err(Error::store)?;

    let mut registry = Registry::default();
    for purifier in purifiers {
      registry.insert(purifier);
    }
    info!(purifiers = registry.order.len(), "fleet loaded");

    Ok(Self { store, registry: RwLock::new(registry) })
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn len(&self) -> usize { self.read().order.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Persist a new purifier and start tracking it.
  pub async fn add_purifier(&self, input: NewPurifier) -> Result<Purifier> {
    let purifier = self.store.add_purifier(input).await.map_err(Error::store)?;
    self.write().insert(purifier.clone());
    info!(
      purifier_id = %purifier.purifier_id,
      owner_id = %purifier.owner_id,
      "purifier added"
    );
    Ok(purifier)
  }

  /// A snapshot of one purifier as last evaluated.
  pub async fn purifier(&self, id: Uuid) -> Result<Purifier> {
    let entry = self.entry(id)?;
    let entry = entry.lock().await;
    Ok(entry.purifier.clone())
  }

  /// Snapshots of all purifiers, optionally restricted to one owner.
  pub async fn purifiers(&self, owner_id: Option<Uuid>) -> Vec<Purifier> {
    let mut out = Vec::new();
    for (_, entry) in self.entries() {
      let entry = entry.lock().await;
      if owner_id.is_none_or(|owner| entry.purifier.owner_id == owner) {
        out.push(entry.purifier.clone());
      }
    }
    out
  }

  /// Replace the consumable in `slot`.
  ///
  /// Validation happens before anything is touched; the slot and its history
  /// record are persisted in one store write, and only then is the in-memory
  /// state updated and the slot's notification marker cleared. Any failure
  /// leaves the purifier exactly as it was.
  pub async fn replace(
    &self,
    purifier_id: Uuid,
    slot: Slot,
    new_installed_at: DateTime<Utc>,
    now: DateTime<Utc>,
    notes: Option<String>,
  ) -> Result<Replacement> {
    let entry = self.entry(purifier_id)?;
    let mut entry = entry.lock().await;

    let replacement = entry
      .purifier
      .consumables
      .prepare_replacement(slot, new_installed_at, now)?;
    let record = MaintenanceRecord::for_replacement(purifier_id, &replacement, notes);

    self
      .store
      .record_replacement(&record, &replacement.current)
      .await
      .map_err(Error::store)?;

    entry.purifier.consumables.apply(&replacement);
    entry.record.clear(slot);
    entry.unsaved[slot.index()] = false;

    info!(
      purifier_id = %purifier_id,
      slot = %slot,
      previous_status = %replacement.previous.status(),
      due_at = %replacement.current.due_at(),
      "consumable replaced"
    );
    Ok(replacement)
  }

  /// Maintenance history for one tracked purifier, oldest first.
  pub async fn maintenance_history(&self, purifier_id: Uuid) -> Result<Vec<MaintenanceRecord>> {
    self.entry(purifier_id)?;
    self
      .store
      .maintenance_history(purifier_id)
      .await
      .map_err(Error::store)
  }

  // ── Internals ───────────────────────────────────────────────────────────

  /// Every entry in sweep order. The registry lock is released on return.
  pub(crate) fn entries(&self) -> Vec<(Uuid, SharedEntry)> {
    let registry = self.read();
    registry
      .order
      .iter()
      .filter_map(|id| registry.entries.get(id).map(|e| (*id, Arc::clone(e))))
      .collect()
  }

  fn entry(&self, id: Uuid) -> Result<SharedEntry> {
    self
      .read()
      .entries
      .get(&id)
      .cloned()
      .ok_or(Error::PurifierNotFound(id))
  }

  fn read(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
    self.registry.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
    self.registry.write().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use purecare_core::lifecycle::ConsumableStatus;
  use purecare_store_sqlite::SqliteStore;

  use super::*;
  use crate::testing::{MemoryStore, at, new_purifier};

  async fn sqlite_fleet() -> Fleet<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    Fleet::load(Arc::new(store)).await.unwrap()
  }

  #[tokio::test]
  async fn load_tracks_every_stored_purifier() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let a = store.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();
    let b = store.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();

    let fleet = Fleet::load(store).await.unwrap();
    let ids: Vec<Uuid> = fleet.entries().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![a.purifier_id, b.purifier_id]);
    assert_eq!(fleet.purifier(b.purifier_id).await.unwrap(), b);
  }

  #[tokio::test]
  async fn load_primes_records_from_persisted_status() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let mut p = store.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();
    p.consumables.refresh(Slot::FilterRo, at(2026, 2, 1));
    store
      .save_consumable(p.purifier_id, Slot::FilterRo, p.consumables.get(Slot::FilterRo))
      .await
      .unwrap();

    let fleet = Fleet::load(store).await.unwrap();
    let (_, entry) = fleet.entries().remove(0);
    let entry = entry.lock().await;
    assert!(entry.record.has_sent(Slot::FilterRo, ConsumableStatus::NeedsReplacement));
    assert_eq!(entry.record.last_sent(Slot::Filter1), None);
  }

  #[tokio::test]
  async fn purifiers_filters_by_owner() {
    let fleet = sqlite_fleet().await;
    let alice = Uuid::new_v4();
    let a1 = fleet.add_purifier(new_purifier(alice)).await.unwrap();
    fleet.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();
    let a2 = fleet.add_purifier(new_purifier(alice)).await.unwrap();

    assert_eq!(fleet.len(), 3);
    assert_eq!(fleet.purifiers(None).await.len(), 3);
    assert_eq!(fleet.purifiers(Some(alice)).await, vec![a1, a2]);
  }

  #[tokio::test]
  async fn replace_persists_slot_and_history() {
    let fleet = sqlite_fleet().await;
    let p = fleet.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();

    let r = fleet
      .replace(
        p.purifier_id,
        Slot::Filter1,
        at(2024, 7, 20),
        at(2024, 7, 21),
        Some("routine".into()),
      )
      .await
      .unwrap();
    assert_eq!(r.current.installed_at(), at(2024, 7, 20));
    assert_eq!(r.current.due_at(), at(2025, 1, 20));
    assert_eq!(r.current.status(), ConsumableStatus::Active);

    let tracked = fleet.purifier(p.purifier_id).await.unwrap();
    let stored = fleet.store().get_purifier(p.purifier_id).await.unwrap().unwrap();
    assert_eq!(tracked.consumables, stored.consumables);

    let history = fleet.maintenance_history(p.purifier_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].slot, Slot::Filter1);
    assert_eq!(history[0].notes.as_deref(), Some("routine"));
  }

  #[tokio::test]
  async fn replace_with_future_date_fails_before_any_write() {
    let fleet = sqlite_fleet().await;
    let p = fleet.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();

    let err = fleet
      .replace(p.purifier_id, Slot::Filter1, at(2025, 6, 1), at(2025, 5, 1), None)
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      Error::Core(purecare_core::Error::FutureInstallDate { .. })
    ));

    assert_eq!(fleet.purifier(p.purifier_id).await.unwrap(), p);
    assert!(fleet.maintenance_history(p.purifier_id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn replace_unknown_purifier_fails() {
    let fleet = sqlite_fleet().await;
    let missing = Uuid::new_v4();
    let err = fleet
      .replace(missing, Slot::Filter1, at(2024, 7, 20), at(2024, 7, 20), None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::PurifierNotFound(id) if id == missing));
  }

  #[tokio::test]
  async fn replace_store_failure_leaves_state_untouched() {
    let store = Arc::new(MemoryStore::default());
    let fleet = Fleet::load(Arc::clone(&store)).await.unwrap();
    let p = fleet.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();

    {
      let (_, entry) = fleet.entries().remove(0);
      entry
        .lock()
        .await
        .record
        .mark_sent(Slot::Filter2, ConsumableStatus::NeedsReplacement);
    }

    store.fail_writes(true);
    let err = fleet
      .replace(p.purifier_id, Slot::Filter2, at(2024, 8, 1), at(2024, 8, 2), None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Store(_)));

    assert_eq!(fleet.purifier(p.purifier_id).await.unwrap(), p);
    let (_, entry) = fleet.entries().remove(0);
    assert!(
      entry
        .lock()
        .await
        .record
        .has_sent(Slot::Filter2, ConsumableStatus::NeedsReplacement)
    );
  }
}
