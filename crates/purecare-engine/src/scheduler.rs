//! The scheduler loop that drives sweeps.
//!
//! Sweeps run on a fixed interval and on demand. A single gate guarantees
//! that no two sweeps overlap: a tick or trigger that arrives while a sweep is
//! in flight is skipped, not queued, and the skip is counted and logged.
//!
//! # Example
//!
//! ```ignore
//! let scheduler = Scheduler::new(fleet, dispatcher, Arc::new(SystemClock))
//!   .with_interval(Duration::from_secs(3600));
//! let handle = scheduler.handle();
//!
//! tokio::spawn(scheduler.run(shutdown.clone()));
//! handle.trigger();
//! ```

use std::{
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use purecare_core::{clock::Clock, store::PurifierStore};
use tokio::{
  sync::{Mutex, Notify, OwnedMutexGuard},
  task::JoinHandle,
  time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
  channel::NotificationChannel,
  dispatch::{Dispatcher, SweepReport},
  fleet::Fleet,
};

/// Default interval between scheduled sweeps (one hour).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// The result of asking for a sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
  Completed(SweepReport),
  /// Another sweep was already running.
  Skipped,
}

/// State shared by the loop and every handle.
struct Runner<S, C> {
  fleet:      Arc<Fleet<S>>,
  dispatcher: Dispatcher<C>,
  clock:      Arc<dyn Clock>,
  gate:       Arc<Mutex<()>>,
  trigger:    Notify,
  skipped:    AtomicU64,
  completed:  AtomicU64,
}

impl<S: PurifierStore, C: NotificationChannel> Runner<S, C> {
  /// Take the sweep gate, or record a skip.
  fn try_begin(&self, reason: &'static str) -> Option<OwnedMutexGuard<()>> {
    match Arc::clone(&self.gate).try_lock_owned() {
      Ok(permit) => Some(permit),
      Err(_) => {
        let skipped = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(reason, skipped, "sweep already in progress; skipping");
        None
      }
    }
  }

  /// Run one sweep while holding `permit`.
  async fn sweep(&self, permit: OwnedMutexGuard<()>) -> SweepReport {
    let now = self.clock.now();
    let report = self.dispatcher.sweep(&self.fleet, now).await;
    self.completed.fetch_add(1, Ordering::Relaxed);
    drop(permit);
    report
  }
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

/// Drives [`Dispatcher::sweep`] over a [`Fleet`].
pub struct Scheduler<S, C> {
  runner:   Arc<Runner<S, C>>,
  interval: Duration,
}

impl<S, C> Scheduler<S, C>
where
  S: PurifierStore + 'static,
  C: NotificationChannel + 'static,
{
  pub fn new(fleet: Arc<Fleet<S>>, dispatcher: Dispatcher<C>, clock: Arc<dyn Clock>) -> Self {
    Self {
      runner:   Arc::new(Runner {
        fleet,
        dispatcher,
        clock,
        gate: Arc::new(Mutex::new(())),
        trigger: Notify::new(),
        skipped: AtomicU64::new(0),
        completed: AtomicU64::new(0),
      }),
      interval: DEFAULT_SWEEP_INTERVAL,
    }
  }

  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  pub fn handle(&self) -> SchedulerHandle<S, C> {
    SchedulerHandle { runner: Arc::clone(&self.runner) }
  }

  /// Run until `shutdown` is cancelled.
  ///
  /// The first sweep happens immediately. Shutdown is checked before every
  /// wake-up; a sweep already in flight is allowed to finish before this
  /// returns.
  pub async fn run(self, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(self.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: Option<JoinHandle<()>> = None;

    info!(interval_secs = self.interval.as_secs(), "scheduler started");

    loop {
      let reason = tokio::select! {
        biased;
        _ = shutdown.cancelled() => break,
        _ = ticker.tick() => "interval",
        _ = self.runner.trigger.notified() => "trigger",
      };

      let Some(permit) = self.runner.try_begin(reason) else {
        continue;
      };
      let runner = Arc::clone(&self.runner);
      in_flight = Some(tokio::spawn(async move {
        runner.sweep(permit).await;
      }));
    }

    if let Some(handle) = in_flight {
      if let Err(e) = handle.await {
        error!(error = %e, "sweep task failed");
      }
    }
    info!(
      completed = self.runner.completed.load(Ordering::Relaxed),
      skipped = self.runner.skipped.load(Ordering::Relaxed),
      "scheduler stopped"
    );
  }
}

// ─── SchedulerHandle ─────────────────────────────────────────────────────────

/// A cloneable handle for requesting sweeps and reading counters.
pub struct SchedulerHandle<S, C> {
  runner: Arc<Runner<S, C>>,
}

impl<S, C> Clone for SchedulerHandle<S, C> {
  fn clone(&self) -> Self { Self { runner: Arc::clone(&self.runner) } }
}

impl<S, C> SchedulerHandle<S, C>
where
  S: PurifierStore + 'static,
  C: NotificationChannel + 'static,
{
  /// Ask the running loop for a sweep as soon as possible.
  pub fn trigger(&self) { self.runner.trigger.notify_one(); }

  /// Sweep right now unless one is already running, and wait for the report.
  ///
  /// The sweep runs on its own task. Dropping the returned future stops the
  /// wait, not the sweep, so crossings it has marked are still handed off.
  pub async fn sweep_now(&self) -> SweepOutcome {
    let Some(permit) = self.runner.try_begin("on demand") else {
      return SweepOutcome::Skipped;
    };
    let runner = Arc::clone(&self.runner);
    let task = tokio::spawn(async move { runner.sweep(permit).await });
    match task.await {
      Ok(report) => SweepOutcome::Completed(report),
      Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
      // Only happens while the runtime shuts down.
      Err(e) => {
        error!(error = %e, "on-demand sweep cancelled");
        SweepOutcome::Skipped
      }
    }
  }

  pub fn fleet(&self) -> &Arc<Fleet<S>> { &self.runner.fleet }

  pub fn clock(&self) -> &Arc<dyn Clock> { &self.runner.clock }

  /// Sweeps requested while another was running.
  pub fn skipped_ticks(&self) -> u64 { self.runner.skipped.load(Ordering::Relaxed) }

  pub fn completed_sweeps(&self) -> u64 { self.runner.completed.load(Ordering::Relaxed) }
}
