//! The consumable lifecycle engine.
//!
//! ```text
//! Scheduler (tokio interval / on-demand trigger)
//!   └── Dispatcher::sweep
//!         └── for each purifier in the Fleet (per-purifier lock)
//!               └── for each slot: resolve status, persist, dedup
//!                     └── NotificationChannel::send (bounded, fire-and-forget)
//! ```
//!
//! Replacements go through [`Fleet::replace`], which takes the same
//! per-purifier lock as a sweep, so the two never interleave on one unit while
//! different units proceed independently.

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod fleet;
pub mod record;
pub mod scheduler;

pub use channel::{Courier, DeliveryWorker, LogCourier, NotificationChannel, QueueChannel};
pub use dispatch::{Dispatcher, SweepReport};
pub use error::{DeliveryError, Error, Result};
pub use fleet::Fleet;
pub use record::NotificationRecord;
pub use scheduler::{Scheduler, SchedulerHandle, SweepOutcome};

#[cfg(test)]
mod testing;
