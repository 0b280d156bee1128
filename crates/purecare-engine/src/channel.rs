//! Hand-off of notifications to the outside world.
//!
//! The dispatcher only ever calls [`NotificationChannel::send`]; what happens
//! afterwards is the channel's business. [`QueueChannel`] is the production
//! channel: a bounded queue drained by a [`DeliveryWorker`], which passes each
//! notification to a [`Courier`] for the actual push/email/in-app delivery.

use std::{future::Future, sync::Arc};

use purecare_core::notification::Notification;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::DeliveryError;

// ─── NotificationChannel ─────────────────────────────────────────────────────

/// Accepts a notification for delivery.
///
/// Returning `Ok` means the channel took responsibility for it, not that the
/// customer has seen it. Implementations must not wait for end-to-end
/// delivery.
pub trait NotificationChannel: Send + Sync {
  fn send<'a>(
    &'a self,
    notification: &'a Notification,
  ) -> impl Future<Output = Result<(), DeliveryError>> + Send + 'a;
}

impl<C: NotificationChannel> NotificationChannel for Arc<C> {
  fn send<'a>(
    &'a self,
    notification: &'a Notification,
  ) -> impl Future<Output = Result<(), DeliveryError>> + Send + 'a {
    (**self).send(notification)
  }
}

/// A bounded in-process queue. `send` waits while the queue is full; the
/// dispatcher bounds that wait with its send timeout.
#[derive(Debug, Clone)]
pub struct QueueChannel {
  tx: mpsc::Sender<Notification>,
}

impl QueueChannel {
  pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Self { tx }, rx)
  }
}

impl NotificationChannel for QueueChannel {
  async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
    self
      .tx
      .send(notification.clone())
      .await
      .map_err(|_| DeliveryError::Closed)
  }
}

// ─── Courier ─────────────────────────────────────────────────────────────────

/// The external delivery mechanism behind a [`QueueChannel`].
pub trait Courier: Send + Sync {
  fn deliver(
    &self,
    notification: Notification,
  ) -> impl Future<Output = Result<(), DeliveryError>> + Send + '_;
}

/// Delivers by writing a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCourier;

impl Courier for LogCourier {
  async fn deliver(&self, n: Notification) -> Result<(), DeliveryError> {
    info!(
      notification_id = %n.notification_id,
      owner_id = %n.owner_id,
      purifier_id = %n.purifier_id,
      slot = %n.slot,
      due_at = %n.consumable.due_at(),
      overdue_days = n.overdue_by().num_days(),
      "{} needs replacement",
      n.slot.label()
    );
    Ok(())
  }
}

// ─── DeliveryWorker ──────────────────────────────────────────────────────────

/// Drains a [`QueueChannel`] into a [`Courier`].
pub struct DeliveryWorker<K> {
  rx:      mpsc::Receiver<Notification>,
  courier: K,
}

impl<K: Courier> DeliveryWorker<K> {
  pub fn new(rx: mpsc::Receiver<Notification>, courier: K) -> Self { Self { rx, courier } }

  /// Deliver until `shutdown` fires or every sender is gone. Notifications
  /// already queued at shutdown are still delivered. Returns how many were
  /// delivered successfully.
  pub async fn run(mut self, shutdown: CancellationToken) -> u64 {
    let mut delivered = 0;

    loop {
      tokio::select! {
        biased;
        _ = shutdown.cancelled() => break,
        next = self.rx.recv() => match next {
          Some(n) => delivered += self.deliver(n).await,
          None => break,
        },
      }
    }

    self.rx.close();
    while let Some(n) = self.rx.recv().await {
      delivered += self.deliver(n).await;
    }

    info!(delivered, "delivery worker stopped");
    delivered
  }

  async fn deliver(&self, n: Notification) -> u64 {
    let notification_id = n.notification_id;
    match self.courier.deliver(n).await {
      Ok(()) => 1,
      Err(e) => {
        warn!(%notification_id, error = %e, "courier failed to deliver notification");
        0
      }
    }
  }
}
