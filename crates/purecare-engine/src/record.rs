//! Per-purifier notification dedup state.

use purecare_core::{consumable::ConsumableSet, lifecycle::ConsumableStatus, slot::Slot};

/// Tracks, for each slot of one purifier, the last status a notification was
/// sent for. Guarantees at most one notification per crossing.
///
/// Lives next to its purifier inside the fleet, under the same lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationRecord {
  sent: [Option<ConsumableStatus>; Slot::COUNT],
}

impl NotificationRecord {
  /// A record that treats every slot already in `needs_replacement` as
  /// notified. Used when loading persisted state so a restart does not repeat
  /// notifications for crossings that happened before it.
  pub fn primed(consumables: &ConsumableSet) -> Self {
    let mut record = Self::default();
    for (slot, c) in consumables.iter() {
      if c.status().needs_replacement() {
        record.mark_sent(slot, ConsumableStatus::NeedsReplacement);
      }
    }
    record
  }

  pub fn last_sent(&self, slot: Slot) -> Option<ConsumableStatus> {
    self.sent[slot.index()]
  }

  pub fn has_sent(&self, slot: Slot, status: ConsumableStatus) -> bool {
    self.last_sent(slot) == Some(status)
  }

  pub fn mark_sent(&mut self, slot: Slot, status: ConsumableStatus) {
    self.sent[slot.index()] = Some(status);
  }

  /// Forget what was sent for `slot` so its next crossing notifies again.
  pub fn clear(&mut self, slot: Slot) { self.sent[slot.index()] = None; }
}
