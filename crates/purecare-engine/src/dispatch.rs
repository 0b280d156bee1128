//! The notification dispatcher: one sweep over the whole fleet.

use std::time::Duration;

use chrono::{DateTime, Utc};
use purecare_core::{
  lifecycle::ConsumableStatus, notification::Notification, slot::Slot, store::PurifierStore,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
  DeliveryError,
  channel::NotificationChannel,
  fleet::{Fleet, FleetEntry},
};

/// Default bound on how long a single hand-off may wait on the channel.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// What one sweep saw and did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
  pub started_at:        DateTime<Utc>,
  pub purifiers:         usize,
  /// Slots evaluated; always `purifiers * 8`.
  pub evaluated:         usize,
  /// Slots whose status moved to `needs_replacement` during this sweep.
  pub crossings:         usize,
  pub emitted:           usize,
  pub delivery_failures: usize,
  pub store_failures:    usize,
  /// Every notification emitted, delivered or not, in sweep order.
  pub notifications:     Vec<Notification>,
}

impl SweepReport {
  fn new(started_at: DateTime<Utc>) -> Self {
    Self {
      started_at,
      purifiers: 0,
      evaluated: 0,
      crossings: 0,
      emitted: 0,
      delivery_failures: 0,
      store_failures: 0,
      notifications: Vec::new(),
    }
  }
}

/// Evaluates every consumable in the fleet and emits at most one notification
/// per crossing.
pub struct Dispatcher<C> {
  channel:      C,
  send_timeout: Duration,
}

impl<C: NotificationChannel> Dispatcher<C> {
  pub fn new(channel: C) -> Self { Self { channel, send_timeout: DEFAULT_SEND_TIMEOUT } }

  pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
    self.send_timeout = send_timeout;
    self
  }

  pub fn channel(&self) -> &C { &self.channel }

  /// Sweep every purifier at `now`.
  ///
  /// Purifiers are visited in fleet order and slots in [`Slot::ALL`] order.
  /// Each purifier is evaluated under its own lock; its notifications are
  /// handed to the channel after the lock is released. Neither store nor
  /// delivery failures abort the sweep: both are logged and counted.
  pub async fn sweep<S: PurifierStore>(&self, fleet: &Fleet<S>, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::new(now);
    let entries = fleet.entries();
    debug!(purifiers = entries.len(), %now, "sweep started");

    for (_, entry) in entries {
      let emitted = {
        let mut entry = entry.lock().await;
        self.evaluate(fleet.store(), &mut entry, now, &mut report).await
      };

      for notification in emitted {
        if let Err(e) = self.deliver(&notification).await {
          report.delivery_failures += 1;
          warn!(
            notification_id = %notification.notification_id,
            purifier_id = %notification.purifier_id,
            slot = %notification.slot,
            error = %e,
            "notification delivery failed"
          );
        }
        report.emitted += 1;
        report.notifications.push(notification);
      }
      report.purifiers += 1;
    }

    info!(
      purifiers = report.purifiers,
      evaluated = report.evaluated,
      crossings = report.crossings,
      emitted = report.emitted,
      delivery_failures = report.delivery_failures,
      store_failures = report.store_failures,
      "sweep finished"
    );
    report
  }

  /// The per-purifier critical section: resolve, persist, dedup.
  async fn evaluate<S: PurifierStore>(
    &self,
    store: &S,
    entry: &mut FleetEntry,
    now: DateTime<Utc>,
    report: &mut SweepReport,
  ) -> Vec<Notification> {
    let FleetEntry { purifier, record, unsaved } = entry;
    let mut emitted = Vec::new();

    for slot in Slot::ALL {
      let (previous, current) = purifier.consumables.refresh(slot, now);
      let consumable = purifier.consumables.get(slot);
      report.evaluated += 1;

      if previous != current && current.needs_replacement() {
        report.crossings += 1;
      }
      // A status that failed to persist is retried until the store takes it.
      if previous != current || unsaved[slot.index()] {
        match store.save_consumable(purifier.purifier_id, slot, consumable).await {
          Ok(()) => unsaved[slot.index()] = false,
          Err(e) => {
            unsaved[slot.index()] = true;
            report.store_failures += 1;
            error!(
              purifier_id = %purifier.purifier_id,
              slot = %slot,
              status = %current,
              error = %e,
              "failed to persist consumable status"
            );
          }
        }
      }

      match current {
        ConsumableStatus::NeedsReplacement
          if !record.has_sent(slot, ConsumableStatus::NeedsReplacement) =>
        {
          record.mark_sent(slot, ConsumableStatus::NeedsReplacement);
          let notification = Notification::new(
            purifier.owner_id,
            purifier.purifier_id,
            slot,
            consumable.clone(),
            now,
          );
          info!(
            notification_id = %notification.notification_id,
            purifier_id = %purifier.purifier_id,
            slot = %slot,
            due_at = %consumable.due_at(),
            "consumable needs replacement"
          );
          emitted.push(notification);
        }
        ConsumableStatus::Active => record.clear(slot),
        _ => {}
      }
    }

    emitted
  }

  async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
    match tokio::time::timeout(self.send_timeout, self.channel.send(notification)).await {
      Ok(result) => result,
      Err(_) => Err(DeliveryError::Timeout),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use chrono::TimeDelta;
  use purecare_core::purifier::NewPurifier;
  use purecare_store_sqlite::SqliteStore;
  use uuid::Uuid;

  use super::*;
  use crate::{
    channel::QueueChannel,
    testing::{MemoryStore, RecordingChannel, at, new_purifier, ro_only_catalog},
  };

  fn ro_only(owner_id: Uuid) -> NewPurifier {
    NewPurifier::new(owner_id, "WP-300", "SN-RO", "Kitchen", at(2024, 1, 15), &ro_only_catalog())
      .unwrap()
  }

  fn slots(report: &SweepReport) -> Vec<Slot> {
    report.notifications.iter().map(|n| n.slot).collect()
  }

  async fn sqlite_fleet() -> Fleet<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    Fleet::load(Arc::new(store)).await.unwrap()
  }

  #[tokio::test]
  async fn ro_crossing_notifies_exactly_once() {
    let fleet = sqlite_fleet().await;
    let owner = Uuid::new_v4();
    let p = fleet.add_purifier(ro_only(owner)).await.unwrap();
    let channel = Arc::new(RecordingChannel::default());
    let dispatcher = Dispatcher::new(Arc::clone(&channel));

    let before = dispatcher
      .sweep(&fleet, at(2026, 1, 15) - TimeDelta::seconds(1))
      .await;
    assert_eq!(before.emitted, 0);

    let crossing = dispatcher.sweep(&fleet, at(2026, 1, 15)).await;
    assert_eq!(crossing.emitted, 1);
    assert_eq!(crossing.crossings, 1);
    assert_eq!(crossing.evaluated, Slot::COUNT);
    let n = &crossing.notifications[0];
    assert_eq!((n.owner_id, n.purifier_id, n.slot), (owner, p.purifier_id, Slot::FilterRo));
    assert_eq!(n.consumable.due_at(), at(2026, 1, 15));
    assert_eq!(n.consumable.status(), ConsumableStatus::NeedsReplacement);

    let next_day = dispatcher.sweep(&fleet, at(2026, 1, 16)).await;
    assert_eq!(next_day.emitted, 0);
    assert_eq!(next_day.crossings, 0);

    assert_eq!(channel.sent().len(), 1);
  }

  #[tokio::test]
  async fn sweep_persists_status_changes() {
    let fleet = sqlite_fleet().await;
    let p = fleet.add_purifier(ro_only(Uuid::new_v4())).await.unwrap();
    let dispatcher = Dispatcher::new(RecordingChannel::default());

    dispatcher.sweep(&fleet, at(2026, 1, 15)).await;

    let stored = fleet.store().get_purifier(p.purifier_id).await.unwrap().unwrap();
    assert_eq!(
      stored.consumables.get(Slot::FilterRo).status(),
      ConsumableStatus::NeedsReplacement
    );
    assert_eq!(stored.consumables.get(Slot::Filter1).status(), ConsumableStatus::Active);
  }

  #[tokio::test]
  async fn replace_rearms_the_slot() {
    let fleet = sqlite_fleet().await;
    let p = fleet.add_purifier(ro_only(Uuid::new_v4())).await.unwrap();
    let dispatcher = Dispatcher::new(RecordingChannel::default());

    assert_eq!(dispatcher.sweep(&fleet, at(2026, 1, 15)).await.emitted, 1);

    fleet
      .replace(p.purifier_id, Slot::FilterRo, at(2026, 1, 20), at(2026, 1, 20), None)
      .await
      .unwrap();
    let after = dispatcher.sweep(&fleet, at(2026, 2, 1)).await;
    assert_eq!(after.emitted, 0);
    assert_eq!(
      fleet.purifier(p.purifier_id).await.unwrap().consumables.get(Slot::FilterRo).status(),
      ConsumableStatus::Active
    );

    // Two years on, the new membrane crosses once.
    assert_eq!(slots(&dispatcher.sweep(&fleet, at(2028, 1, 20)).await), vec![Slot::FilterRo]);
    assert_eq!(dispatcher.sweep(&fleet, at(2028, 6, 1)).await.emitted, 0);
  }

  #[tokio::test]
  async fn notifications_follow_fleet_then_slot_order() {
    let fleet = sqlite_fleet().await;
    let first = fleet.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();
    let second = fleet.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();
    let dispatcher = Dispatcher::new(RecordingChannel::default());

    let report = dispatcher.sweep(&fleet, at(2026, 1, 15)).await;
    let due = [Slot::Filter1, Slot::Filter2, Slot::Filter3, Slot::FilterRo, Slot::Filter7];
    let expected: Vec<(Uuid, Slot)> = [first.purifier_id, second.purifier_id]
      .into_iter()
      .flat_map(|id| due.map(|slot| (id, slot)))
      .collect();
    let actual: Vec<(Uuid, Slot)> =
      report.notifications.iter().map(|n| (n.purifier_id, n.slot)).collect();

    assert_eq!(actual, expected);
    assert_eq!(report.purifiers, 2);
    assert_eq!(report.evaluated, 2 * Slot::COUNT);
    assert_eq!(dispatcher.channel().sent(), report.notifications);
  }

  #[tokio::test]
  async fn delivery_failure_does_not_abort_the_sweep() {
    let fleet = sqlite_fleet().await;
    fleet.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();
    let dispatcher = Dispatcher::new(RecordingChannel::rejecting(Slot::Filter2));

    let report = dispatcher.sweep(&fleet, at(2026, 1, 15)).await;
    assert_eq!(report.emitted, 5);
    assert_eq!(report.delivery_failures, 1);
    assert_eq!(
      dispatcher.channel().sent().iter().map(|n| n.slot).collect::<Vec<_>>(),
      vec![Slot::Filter1, Slot::Filter3, Slot::FilterRo, Slot::Filter7]
    );

    // The failed slot is still considered notified.
    assert_eq!(dispatcher.sweep(&fleet, at(2026, 1, 16)).await.emitted, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn full_queue_times_out_per_notification() {
    let store = Arc::new(MemoryStore::default());
    let fleet = Fleet::load(store).await.unwrap();
    fleet.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();

    let (channel, _rx) = QueueChannel::bounded(1);
    let dispatcher = Dispatcher::new(channel).with_send_timeout(Duration::from_millis(50));

    let report = dispatcher.sweep(&fleet, at(2026, 1, 15)).await;
    assert_eq!(report.emitted, 5);
    assert_eq!(report.delivery_failures, 4);
  }

  #[tokio::test]
  async fn store_failure_is_counted_and_sweep_continues() {
    let store = Arc::new(MemoryStore::default());
    let fleet = Fleet::load(Arc::clone(&store)).await.unwrap();
    fleet.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();
    store.fail_writes(true);

    let dispatcher = Dispatcher::new(RecordingChannel::default());
    let report = dispatcher.sweep(&fleet, at(2026, 1, 15)).await;
    assert_eq!(report.store_failures, 5);
    assert_eq!(report.emitted, 5);
    assert_eq!(dispatcher.channel().sent().len(), 5);
  }

  #[tokio::test]
  async fn failed_status_write_is_retried_next_sweep() {
    let store = Arc::new(MemoryStore::default());
    let fleet = Fleet::load(Arc::clone(&store)).await.unwrap();
    let p = fleet.add_purifier(new_purifier(Uuid::new_v4())).await.unwrap();
    let dispatcher = Dispatcher::new(RecordingChannel::default());

    store.fail_writes(true);
    assert_eq!(dispatcher.sweep(&fleet, at(2026, 1, 15)).await.store_failures, 5);

    store.fail_writes(false);
    let retry = dispatcher.sweep(&fleet, at(2026, 1, 16)).await;
    assert_eq!(retry.store_failures, 0);
    assert_eq!(retry.crossings, 0);
    assert_eq!(retry.emitted, 0);
    let stored = store.get_purifier(p.purifier_id).await.unwrap().unwrap();
    assert_eq!(
      stored.consumables.get(Slot::FilterRo).status(),
      ConsumableStatus::NeedsReplacement
    );

    // After a restart the crossings are already known.
    let reloaded = Fleet::load(store).await.unwrap();
    assert_eq!(dispatcher.sweep(&reloaded, at(2026, 1, 17)).await.emitted, 0);
    assert_eq!(dispatcher.channel().sent().len(), 5);
  }

  #[tokio::test]
  async fn reloaded_fleet_does_not_renotify() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let fleet = Fleet::load(Arc::clone(&store)).await.unwrap();
    fleet.add_purifier(ro_only(Uuid::new_v4())).await.unwrap();
    let dispatcher = Dispatcher::new(RecordingChannel::default());
    assert_eq!(dispatcher.sweep(&fleet, at(2026, 1, 15)).await.emitted, 1);

    let reloaded = Fleet::load(store).await.unwrap();
    let report = dispatcher.sweep(&reloaded, at(2026, 1, 16)).await;
    assert_eq!(report.emitted, 0);
    assert_eq!(report.crossings, 0);
  }
}
