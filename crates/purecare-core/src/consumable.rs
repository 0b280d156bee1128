//! Consumables and the fixed per-purifier consumable set.
//!
//! A [`Consumable`]'s due date is a cached projection of its install date and
//! lifespan. Both inputs are private and the due date is recomputed on every
//! construction, so it cannot drift from its derivation.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  catalog::LifespanCatalog,
  lifecycle::{ConsumableStatus, resolve_status, time_until_due},
  lifespan::{Lifespan, due_date},
  slot::Slot,
};

// ─── Consumable ──────────────────────────────────────────────────────────────

/// One tracked consumable.
///
/// Serialises with its `due_at`; deserialisation ignores any supplied
/// `due_at` and derives it again from `installed_at` and `lifespan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredConsumable")]
pub struct Consumable {
  #[serde(rename = "type")]
  kind:         String,
  lifespan:     Lifespan,
  installed_at: DateTime<Utc>,
  due_at:       DateTime<Utc>,
  status:       ConsumableStatus,
}

impl Consumable {
  /// A freshly installed consumable in `active` status.
  pub fn install(
    kind: impl Into<String>,
    lifespan: Lifespan,
    installed_at: DateTime<Utc>,
  ) -> Result<Self> {
    Self::restore(kind, lifespan, installed_at, ConsumableStatus::Active)
  }

  /// Rebuild a consumable from persisted parts, deriving its due date.
  pub fn restore(
    kind: impl Into<String>,
    lifespan: Lifespan,
    installed_at: DateTime<Utc>,
    status: ConsumableStatus,
  ) -> Result<Self> {
    Ok(Self {
      kind: kind.into(),
      lifespan,
      installed_at,
      due_at: due_date(installed_at, lifespan)?,
      status,
    })
  }

  pub fn kind(&self) -> &str { &self.kind }

  pub fn lifespan(&self) -> Lifespan { self.lifespan }

  pub fn installed_at(&self) -> DateTime<Utc> { self.installed_at }

  pub fn due_at(&self) -> DateTime<Utc> { self.due_at }

  pub fn status(&self) -> ConsumableStatus { self.status }

  /// The status this consumable should hold at `now`, without applying it.
  pub fn resolve(&self, now: DateTime<Utc>) -> ConsumableStatus {
    resolve_status(self.due_at, now, self.status)
  }

  /// Apply the resolved status for `now`. Returns the previous status.
  pub fn refresh(&mut self, now: DateTime<Utc>) -> ConsumableStatus {
    let previous = self.status;
    self.status = self.resolve(now);
    previous
  }

  pub fn time_until_due(&self, now: DateTime<Utc>) -> TimeDelta {
    time_until_due(self.due_at, now)
  }

  /// The same consumable reinstalled at `installed_at`: clock reset, due date
  /// recomputed, status back to `active`.
  fn reinstalled(&self, installed_at: DateTime<Utc>) -> Result<Self> {
    Self::install(self.kind.clone(), self.lifespan, installed_at)
  }
}

#[derive(Deserialize)]
struct StoredConsumable {
  #[serde(rename = "type")]
  kind:         String,
  lifespan:     Lifespan,
  installed_at: DateTime<Utc>,
  status:       ConsumableStatus,
}

impl TryFrom<StoredConsumable> for Consumable {
  type Error = Error;

  fn try_from(s: StoredConsumable) -> Result<Self> {
    Self::restore(s.kind, s.lifespan, s.installed_at, s.status)
  }
}

// ─── Replacement ─────────────────────────────────────────────────────────────

/// A validated, not-yet-applied replacement of one slot.
///
/// Produced by [`ConsumableSet::prepare_replacement`] so callers can persist
/// the new state before committing it with [`ConsumableSet::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
  pub slot:        Slot,
  pub previous:    Consumable,
  pub current:     Consumable,
  /// When the replacement was recorded (the caller's `now`).
  pub replaced_at: DateTime<Utc>,
}

// ─── ConsumableSet ───────────────────────────────────────────────────────────

/// The eight consumables fitted to one purifier, one per [`Slot`].
///
/// The slots are plain fields: none can be added or removed after
/// construction, only replaced or re-evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumableSet {
  filter1:   Consumable,
  filter2:   Consumable,
  filter3:   Consumable,
  #[serde(rename = "filterRO")]
  filter_ro: Consumable,
  filter4:   Consumable,
  filter5:   Consumable,
  filter6:   Consumable,
  filter7:   Consumable,
}

impl ConsumableSet {
  /// Install every slot at `installed_at` using the lifespans in `catalog`.
  pub fn install(catalog: &LifespanCatalog, installed_at: DateTime<Utc>) -> Result<Self> {
    Self::try_from_fn(|slot| {
      Consumable::install(slot.label(), catalog.lifespan(slot), installed_at)
    })
  }

  /// Build a set by producing each slot's consumable in enumeration order.
  pub fn try_from_fn(mut f: impl FnMut(Slot) -> Result<Consumable>) -> Result<Self> {
    Ok(Self {
      filter1:   f(Slot::Filter1)?,
      filter2:   f(Slot::Filter2)?,
      filter3:   f(Slot::Filter3)?,
      filter_ro: f(Slot::FilterRo)?,
      filter4:   f(Slot::Filter4)?,
      filter5:   f(Slot::Filter5)?,
      filter6:   f(Slot::Filter6)?,
      filter7:   f(Slot::Filter7)?,
    })
  }

  pub fn get(&self, slot: Slot) -> &Consumable {
    match slot {
      Slot::Filter1 => &self.filter1,
      Slot::Filter2 => &self.filter2,
      Slot::Filter3 => &self.filter3,
      Slot::FilterRo => &self.filter_ro,
      Slot::Filter4 => &self.filter4,
      Slot::Filter5 => &self.filter5,
      Slot::Filter6 => &self.filter6,
      Slot::Filter7 => &self.filter7,
    }
  }

  fn get_mut(&mut self, slot: Slot) -> &mut Consumable {
    match slot {
      Slot::Filter1 => &mut self.filter1,
      Slot::Filter2 => &mut self.filter2,
      Slot::Filter3 => &mut self.filter3,
      Slot::FilterRo => &mut self.filter_ro,
      Slot::Filter4 => &mut self.filter4,
      Slot::Filter5 => &mut self.filter5,
      Slot::Filter6 => &mut self.filter6,
      Slot::Filter7 => &mut self.filter7,
    }
  }

  /// Iterate over `(slot, consumable)` in enumeration order.
  pub fn iter(&self) -> impl Iterator<Item = (Slot, &Consumable)> + '_ {
    Slot::ALL.into_iter().map(move |slot| (slot, self.get(slot)))
  }

  /// Re-evaluate one slot at `now`. Returns `(previous, current)` status.
  pub fn refresh(
    &mut self,
    slot: Slot,
    now: DateTime<Utc>,
  ) -> (ConsumableStatus, ConsumableStatus) {
    let consumable = self.get_mut(slot);
    let previous = consumable.refresh(now);
    (previous, consumable.status())
  }

  /// Validate a replacement of `slot` without mutating the set.
  ///
  /// Fails with [`Error::FutureInstallDate`] if `new_installed_at > now`.
  pub fn prepare_replacement(
    &self,
    slot: Slot,
    new_installed_at: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> Result<Replacement> {
    if new_installed_at > now {
      return Err(Error::FutureInstallDate {
        installed_at: new_installed_at,
        now,
      });
    }
    let previous = self.get(slot).clone();
    let current = previous.reinstalled(new_installed_at)?;
    Ok(Replacement {
      slot,
      previous,
      current,
      replaced_at: now,
    })
  }

  /// Commit a prepared replacement and return the updated consumable.
  pub fn apply(&mut self, replacement: &Replacement) -> &Consumable {
    let slot = self.get_mut(replacement.slot);
    *slot = replacement.current.clone();
    slot
  }

  /// Validate and apply a replacement in one step.
  pub fn replace(
    &mut self,
    slot: Slot,
    new_installed_at: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> Result<Replacement> {
    let replacement = self.prepare_replacement(slot, new_installed_at, now)?;
    self.apply(&replacement);
    Ok(replacement)
  }
}
