//! Error type for `purecare-store-sqlite`.

use purecare_core::slot::Slot;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] purecare_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("purifier not found: {0}")]
  PurifierNotFound(uuid::Uuid),

  /// A purifier row exists but one of its eight consumable rows is missing.
  #[error("purifier {purifier_id} has no stored consumable for slot {slot}")]
  MissingSlot {
    purifier_id: uuid::Uuid,
    slot:        Slot,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
