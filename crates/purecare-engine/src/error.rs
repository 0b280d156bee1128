//! Error types for `purecare-engine`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] purecare_core::Error),

  #[error("purifier not found: {0}")]
  PurifierNotFound(Uuid),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A notification could not be handed to (or delivered by) its channel.
///
/// Never aborts a sweep: it is logged and counted, and the dispatcher moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
  #[error("timed out waiting for the notification channel")]
  Timeout,

  #[error("notification channel is closed")]
  Closed,

  #[error("notification rejected: {0}")]
  Rejected(String),
}
