//! Error types for `purecare-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid lifespan {value}: must be a positive, finite number")]
  InvalidLifespan { value: f64 },

  #[error("unknown lifespan unit: {0:?}")]
  UnknownUnit(String),

  #[error("unknown consumable slot: {0:?}")]
  UnknownSlot(String),

  #[error("unknown consumable status: {0:?}")]
  UnknownStatus(String),

  #[error("install date {installed_at} is later than now ({now})")]
  FutureInstallDate {
    installed_at: DateTime<Utc>,
    now:          DateTime<Utc>,
  },

  #[error("due date falls outside the supported calendar range")]
  DateOutOfRange,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
