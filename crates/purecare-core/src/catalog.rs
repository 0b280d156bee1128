//! Per-slot rated lifespans.

use serde::{Deserialize, Serialize};

use crate::{
  lifespan::{Lifespan, LifespanUnit},
  slot::Slot,
};

/// The lifespan assigned to each consumable slot.
///
/// Usually deserialised from configuration; every field is a validated
/// [`Lifespan`], so a non-positive value is rejected while the configuration
/// is loaded and can never reach a sweep. Missing fields fall back to the
/// defaults below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifespanCatalog {
  pub filter1:   Lifespan,
  pub filter2:   Lifespan,
  pub filter3:   Lifespan,
  #[serde(rename = "filterRO", alias = "filterro", alias = "filter_ro")]
  pub filter_ro: Lifespan,
  pub filter4:   Lifespan,
  pub filter5:   Lifespan,
  pub filter6:   Lifespan,
  pub filter7:   Lifespan,
}

impl LifespanCatalog {
  pub fn lifespan(&self, slot: Slot) -> Lifespan {
    match slot {
      Slot::Filter1 => self.filter1,
      Slot::Filter2 => self.filter2,
      Slot::Filter3 => self.filter3,
      Slot::FilterRo => self.filter_ro,
      Slot::Filter4 => self.filter4,
      Slot::Filter5 => self.filter5,
      Slot::Filter6 => self.filter6,
      Slot::Filter7 => self.filter7,
    }
  }
}

impl Default for LifespanCatalog {
  fn default() -> Self {
    Self {
      filter1:   Lifespan::known(6.0, LifespanUnit::Month),
      filter2:   Lifespan::known(6.0, LifespanUnit::Month),
      filter3:   Lifespan::known(6.0, LifespanUnit::Month),
      filter_ro: Lifespan::known(2.0, LifespanUnit::Year),
      filter4:   Lifespan::known(9.0, LifespanUnit::Year),
      filter5:   Lifespan::known(4.0, LifespanUnit::Year),
      filter6:   Lifespan::known(2.5, LifespanUnit::Year),
      filter7:   Lifespan::known(1.75, LifespanUnit::Year),
    }
  }
}
