//! Consumable status and the status resolver.
//!
//! ```text
//!   active ──(now >= due_at)──▶ needs_replacement
//!     ▲                               │
//!     └────── replaced ◀──(replace)───┘
//! ```
//!
//! `needs_replacement` is sticky: only an explicit replacement leaves it.
//! `replaced` is transient; a replacement lands the consumable back in
//! `active` in the same step that resets its install date. How long a
//! consumable has been overdue is measured by `now - due_at`, never by a
//! separate status.

use std::{fmt, str::FromStr};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The lifecycle state of one consumable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumableStatus {
  Active,
  NeedsReplacement,
  Replaced,
}

impl ConsumableStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::NeedsReplacement => "needs_replacement",
      Self::Replaced => "replaced",
    }
  }

  pub fn needs_replacement(self) -> bool {
    matches!(self, Self::NeedsReplacement)
  }
}

impl fmt::Display for ConsumableStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ConsumableStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "active" => Ok(Self::Active),
      "needs_replacement" => Ok(Self::NeedsReplacement),
      "replaced" => Ok(Self::Replaced),
      other => Err(Error::UnknownStatus(other.to_owned())),
    }
  }
}

/// Derive the status a consumable should hold at `now`.
///
/// Pure and idempotent. A `replaced` consumable has just been reinstalled, so
/// it is evaluated exactly like an `active` one.
pub fn resolve_status(
  due_at: DateTime<Utc>,
  now: DateTime<Utc>,
  current: ConsumableStatus,
) -> ConsumableStatus {
  match current {
    ConsumableStatus::NeedsReplacement => ConsumableStatus::NeedsReplacement,
    ConsumableStatus::Active | ConsumableStatus::Replaced => {
      if now >= due_at {
        ConsumableStatus::NeedsReplacement
      } else {
        ConsumableStatus::Active
      }
    }
  }
}

/// Signed time remaining until `due_at`. Negative once overdue.
pub fn time_until_due(due_at: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
  due_at - now
}

/// Whole days until `due_at`, rounded towards negative infinity so that a
/// consumable due later today reports `0` and one due earlier today reports
/// `-1`.
pub fn days_until_due(due_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
  time_until_due(due_at, now)
    .num_seconds()
    .div_euclid(86_400)
}
