//! Replacement notifications handed to the outside world.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{consumable::Consumable, slot::Slot};

/// A "this consumable needs replacing" message, emitted once per crossing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  /// The customer to notify.
  pub owner_id:        Uuid,
  pub purifier_id:     Uuid,
  pub slot:            Slot,
  /// Snapshot of the consumable at the moment of the crossing.
  pub consumable:      Consumable,
  pub emitted_at:      DateTime<Utc>,
}

impl Notification {
  pub fn new(
    owner_id: Uuid,
    purifier_id: Uuid,
    slot: Slot,
    consumable: Consumable,
    emitted_at: DateTime<Utc>,
  ) -> Self {
    Self {
      notification_id: Uuid::new_v4(),
      owner_id,
      purifier_id,
      slot,
      consumable,
      emitted_at,
    }
  }

  /// How far past its due date the consumable was when this was emitted.
  pub fn overdue_by(&self) -> TimeDelta { self.emitted_at - self.consumable.due_at() }
}
