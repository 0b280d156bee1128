//! The fixed set of consumable slots fitted to every purifier.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One of the eight consumable positions on a purifier.
///
/// Declaration order is the enumeration order used everywhere a purifier's
/// slots are walked (sweeps, listings, storage).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Slot {
  #[serde(rename = "filter1")]
  Filter1,
  #[serde(rename = "filter2")]
  Filter2,
  #[serde(rename = "filter3")]
  Filter3,
  #[serde(rename = "filterRO")]
  FilterRo,
  #[serde(rename = "filter4")]
  Filter4,
  #[serde(rename = "filter5")]
  Filter5,
  #[serde(rename = "filter6")]
  Filter6,
  #[serde(rename = "filter7")]
  Filter7,
}

impl Slot {
  pub const COUNT: usize = 8;

  /// Every slot, in enumeration order.
  pub const ALL: [Slot; Slot::COUNT] = [
    Slot::Filter1,
    Slot::Filter2,
    Slot::Filter3,
    Slot::FilterRo,
    Slot::Filter4,
    Slot::Filter5,
    Slot::Filter6,
    Slot::Filter7,
  ];

  /// Identifier used on the wire and in storage. Matches the serde names.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Filter1 => "filter1",
      Self::Filter2 => "filter2",
      Self::Filter3 => "filter3",
      Self::FilterRo => "filterRO",
      Self::Filter4 => "filter4",
      Self::Filter5 => "filter5",
      Self::Filter6 => "filter6",
      Self::Filter7 => "filter7",
    }
  }

  /// Human-readable name of the consumable kind fitted in this slot.
  pub fn label(self) -> &'static str {
    match self {
      Self::Filter1 => "Filter 1",
      Self::Filter2 => "Filter 2",
      Self::Filter3 => "Filter 3",
      Self::FilterRo => "RO membrane",
      Self::Filter4 => "Filter 4",
      Self::Filter5 => "Filter 5",
      Self::Filter6 => "Filter 6",
      Self::Filter7 => "Filter 7",
    }
  }

  /// Position within [`Slot::ALL`].
  pub fn index(self) -> usize { self as usize }
}

impl fmt::Display for Slot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Slot {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Slot::ALL
      .into_iter()
      .find(|slot| slot.as_str() == s)
      .ok_or_else(|| Error::UnknownSlot(s.to_owned()))
  }
}
