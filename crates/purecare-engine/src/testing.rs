//! Test doubles shared by the engine's unit tests.

use std::sync::{
  Mutex,
  atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, TimeZone, Utc};
use purecare_core::{
  catalog::LifespanCatalog,
  consumable::{Consumable, ConsumableSet},
  lifespan::Lifespan,
  notification::Notification,
  purifier::{MaintenanceRecord, NewPurifier, Purifier},
  slot::Slot,
  store::PurifierStore,
};
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

use crate::{DeliveryError, channel::NotificationChannel};

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// A purifier installed on 2024-01-15 with the default catalog.
pub fn new_purifier(owner_id: Uuid) -> NewPurifier {
  NewPurifier::new(owner_id, "WP-300", "SN-001", "Kitchen", at(2024, 1, 15), &LifespanCatalog::default())
    .unwrap()
}

/// Every slot lasts ten years except the RO membrane (two years).
pub fn ro_only_catalog() -> LifespanCatalog {
  let long = Lifespan::years(10.0).unwrap();
  LifespanCatalog {
    filter1:   long,
    filter2:   long,
    filter3:   long,
    filter_ro: Lifespan::years(2.0).unwrap(),
    filter4:   long,
    filter5:   long,
    filter6:   long,
    filter7:   long,
  }
}

// ─── MemoryStore ─────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
  #[error(transparent)]
  Core(#[from] purecare_core::Error),
  #[error("purifier not found: {0}")]
  NotFound(Uuid),
  #[error("store unavailable")]
  Unavailable,
}

/// A `PurifierStore` whose futures complete immediately, for tests that run
/// on a paused clock. Writes can be switched off to simulate an outage.
#[derive(Default)]
pub struct MemoryStore {
  purifiers:   Mutex<Vec<Purifier>>,
  history:     Mutex<Vec<MaintenanceRecord>>,
  fail_writes: AtomicBool,
}

impl MemoryStore {
  pub fn fail_writes(&self, fail: bool) { self.fail_writes.store(fail, Ordering::SeqCst); }

  fn check_writes(&self) -> Result<(), MemoryError> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(MemoryError::Unavailable);
    }
    Ok(())
  }

  fn overwrite(&self, purifier_id: Uuid, slot: Slot, consumable: &Consumable) -> Result<(), MemoryError> {
    let mut purifiers = self.purifiers.lock().unwrap();
    let purifier = purifiers
      .iter_mut()
      .find(|p| p.purifier_id == purifier_id)
      .ok_or(MemoryError::NotFound(purifier_id))?;
    let updated = ConsumableSet::try_from_fn(|s| {
      Ok(if s == slot { consumable.clone() } else { purifier.consumables.get(s).clone() })
    })?;
    purifier.consumables = updated;
    Ok(())
  }
}

impl PurifierStore for MemoryStore {
  type Error = MemoryError;

  async fn add_purifier(&self, input: NewPurifier) -> Result<Purifier, MemoryError> {
    self.check_writes()?;
    let purifier = input.into_purifier(Uuid::new_v4());
    self.purifiers.lock().unwrap().push(purifier.clone());
    Ok(purifier)
  }

  async fn get_purifier(&self, id: Uuid) -> Result<Option<Purifier>, MemoryError> {
    Ok(self.purifiers.lock().unwrap().iter().find(|p| p.purifier_id == id).cloned())
  }

  async fn list_purifiers(&self, owner_id: Option<Uuid>) -> Result<Vec<Purifier>, MemoryError> {
    Ok(
      self
        .purifiers
        .lock()
        .unwrap()
        .iter()
        .filter(|p| owner_id.is_none_or(|o| p.owner_id == o))
        .cloned()
        .collect(),
    )
  }

  async fn save_consumable(
    &self,
    purifier_id: Uuid,
    slot: Slot,
    consumable: &Consumable,
  ) -> Result<(), MemoryError> {
    self.check_writes()?;
    self.overwrite(purifier_id, slot, consumable)
  }

  async fn record_replacement(
    &self,
    record: &MaintenanceRecord,
    consumable: &Consumable,
  ) -> Result<(), MemoryError> {
    self.check_writes()?;
    self.overwrite(record.purifier_id, record.slot, consumable)?;
    self.history.lock().unwrap().push(record.clone());
    Ok(())
  }

  async fn maintenance_history(&self, purifier_id: Uuid) -> Result<Vec<MaintenanceRecord>, MemoryError> {
    Ok(
      self
        .history
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.purifier_id == purifier_id)
        .cloned()
        .collect(),
    )
  }
}

// ─── Channels ────────────────────────────────────────────────────────────────

/// Records every accepted notification; optionally rejects one slot.
#[derive(Default)]
pub struct RecordingChannel {
  sent:   Mutex<Vec<Notification>>,
  reject: Option<Slot>,
}

impl RecordingChannel {
  pub fn rejecting(slot: Slot) -> Self { Self { reject: Some(slot), ..Default::default() } }

  pub fn sent(&self) -> Vec<Notification> { self.sent.lock().unwrap().clone() }
}

impl NotificationChannel for RecordingChannel {
  async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
    if self.reject == Some(notification.slot) {
      return Err(DeliveryError::Rejected("unreachable device".into()));
    }
    self.sent.lock().unwrap().push(notification.clone());
    Ok(())
  }
}

/// Holds every send until [`GatedChannel::open`] is called, so a sweep can be
/// kept in flight.
pub struct GatedChannel {
  pub entered: Notify,
  gate:        Semaphore,
  sent:        Mutex<Vec<Notification>>,
}

impl Default for GatedChannel {
  fn default() -> Self {
    Self { entered: Notify::new(), gate: Semaphore::new(0), sent: Mutex::default() }
  }
}

impl GatedChannel {
  pub fn open(&self) { self.gate.add_permits(1); }

  pub fn sent(&self) -> Vec<Notification> { self.sent.lock().unwrap().clone() }
}

impl NotificationChannel for GatedChannel {
  async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
    self.entered.notify_one();
    let _permit = self.gate.acquire().await.map_err(|_| DeliveryError::Closed)?;
    self.sent.lock().unwrap().push(notification.clone());
    Ok(())
  }
}
