//! Lifespans and the due-date calculator.
//!
//! A lifespan is the rated service duration of a consumable: a positive real
//! number of days, months, or years. The due date of a consumable is its
//! install timestamp advanced by its lifespan, computed by [`due_date`].
//!
//! # Decomposition rule
//!
//! - **day**: `value × 86 400` seconds.
//! - **month**: advance `floor(value)` calendar months, then add the fraction
//!   as that share of the *following* calendar-month step. 2.5 months from
//!   15 January lands halfway between 15 March and 15 April.
//! - **year**: advance `floor(value)` calendar years (twelve months each) and
//!   apply the remaining fraction as `fraction × 12` months under the month
//!   rule. 2.5 years is exactly 30 months; 1.75 years is 21 months.
//!
//! Calendar months are anchored to the end of the month: a timestamp on the
//! last day of its month advances to the last day of the target month, and a
//! day that does not exist in the target month clamps to that month's last
//! day (31 January + 1 month is 28 or 29 February).
//!
//! Fractional remainders are rounded to the nearest whole second. Because the
//! fractional part interpolates between two consecutive calendar steps, the
//! result is continuous and monotonic in `value`.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const SECONDS_PER_DAY: f64 = 86_400.0;
const MONTHS_PER_YEAR: f64 = 12.0;

// ─── Unit ────────────────────────────────────────────────────────────────────

/// The unit a [`Lifespan`] is expressed in.
///
/// Serialises as `day`, `month`, or `year`; the short codes `d`, `m`, and `y`
/// are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifespanUnit {
  #[serde(alias = "d")]
  Day,
  #[serde(alias = "m")]
  Month,
  #[serde(alias = "y")]
  Year,
}

impl LifespanUnit {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Day => "day",
      Self::Month => "month",
      Self::Year => "year",
    }
  }
}

impl fmt::Display for LifespanUnit {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for LifespanUnit {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "day" | "d" => Ok(Self::Day),
      "month" | "m" => Ok(Self::Month),
      "year" | "y" => Ok(Self::Year),
      other => Err(Error::UnknownUnit(other.to_owned())),
    }
  }
}

// ─── Lifespan ────────────────────────────────────────────────────────────────

/// A validated `(value, unit)` pair. `value` is always positive and finite.
///
/// Fields are private so that an invalid lifespan cannot be constructed;
/// deserialisation goes through the same validation as [`Lifespan::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLifespan", into = "RawLifespan")]
pub struct Lifespan {
  value: f64,
  unit:  LifespanUnit,
}

impl Lifespan {
  /// Build a lifespan, rejecting non-positive or non-finite values.
  pub fn new(value: f64, unit: LifespanUnit) -> Result<Self> {
    if !(value.is_finite() && value > 0.0) {
      return Err(Error::InvalidLifespan { value });
    }
    Ok(Self { value, unit })
  }

  pub fn days(value: f64) -> Result<Self> { Self::new(value, LifespanUnit::Day) }

  pub fn months(value: f64) -> Result<Self> {
    Self::new(value, LifespanUnit::Month)
  }

  pub fn years(value: f64) -> Result<Self> {
    Self::new(value, LifespanUnit::Year)
  }

  /// Compile-time constructor for the built-in catalog. Callers must pass a
  /// positive, finite value.
  pub(crate) const fn known(value: f64, unit: LifespanUnit) -> Self {
    Self { value, unit }
  }

  pub fn value(&self) -> f64 { self.value }

  pub fn unit(&self) -> LifespanUnit { self.unit }
}

impl fmt::Display for Lifespan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.value, self.unit)
  }
}

#[derive(Clone, Serialize, Deserialize)]
struct RawLifespan {
  value: f64,
  unit:  LifespanUnit,
}

impl TryFrom<RawLifespan> for Lifespan {
  type Error = Error;

  fn try_from(raw: RawLifespan) -> Result<Self> { Self::new(raw.value, raw.unit) }
}

impl From<Lifespan> for RawLifespan {
  fn from(l: Lifespan) -> Self {
    Self {
      value: l.value,
      unit:  l.unit,
    }
  }
}

// ─── Calculator ──────────────────────────────────────────────────────────────

/// Advance `installed_at` by `lifespan` under the decomposition rule described
/// in the module docs.
///
/// Pure: the result depends only on the arguments. Fails only when the result
/// would fall outside chrono's representable range.
pub fn due_date(
  installed_at: DateTime<Utc>,
  lifespan: Lifespan,
) -> Result<DateTime<Utc>> {
  let value = lifespan.value;
  match lifespan.unit {
    LifespanUnit::Day => add_seconds(installed_at, value * SECONDS_PER_DAY),
    LifespanUnit::Month => {
      let whole = value.floor();
      advance_months(installed_at, whole, value - whole)
    }
    LifespanUnit::Year => {
      let whole_years = value.floor();
      let extra_months = (value - whole_years) * MONTHS_PER_YEAR;
      let whole_extra = extra_months.floor();
      advance_months(
        installed_at,
        whole_years * MONTHS_PER_YEAR + whole_extra,
        extra_months - whole_extra,
      )
    }
  }
}

/// Advance by `whole` calendar months, then interpolate `fraction` of the way
/// towards the next calendar month.
fn advance_months(
  start: DateTime<Utc>,
  whole: f64,
  fraction: f64,
) -> Result<DateTime<Utc>> {
  if whole > f64::from(u32::MAX) {
    return Err(Error::DateOutOfRange);
  }
  let whole = whole as u32;
  let base = add_calendar_months(start, whole).ok_or(Error::DateOutOfRange)?;
  if fraction <= 0.0 {
    return Ok(base);
  }

  let next = whole
    .checked_add(1)
    .and_then(|n| add_calendar_months(start, n))
    .ok_or(Error::DateOutOfRange)?;
  let step = (next - base).num_seconds() as f64;
  add_seconds(base, fraction * step)
}

/// Calendar month addition with end-of-month anchoring.
fn add_calendar_months(start: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
  let shifted = start.checked_add_months(Months::new(months))?;
  if is_last_day_of_month(start.date_naive()) {
    let last = last_day_of_month(shifted.year(), shifted.month())?;
    shifted.with_day(last)
  } else {
    Some(shifted)
  }
}

fn add_seconds(at: DateTime<Utc>, seconds: f64) -> Result<DateTime<Utc>> {
  let seconds = seconds.round();
  if !seconds.is_finite() {
    return Err(Error::DateOutOfRange);
  }
  // `as` saturates; an out-of-range count is rejected by `try_seconds`.
  TimeDelta::try_seconds(seconds as i64)
    .and_then(|delta| at.checked_add_signed(delta))
    .ok_or(Error::DateOutOfRange)
}

fn is_last_day_of_month(date: NaiveDate) -> bool {
  date.succ_opt().is_none_or(|next| next.month() != date.month())
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
  let (next_year, next_month) =
    if month == 12 { (year + 1, 1) } else { (year, month + 1) };
  NaiveDate::from_ymd_opt(next_year, next_month, 1)?
    .pred_opt()
    .map(|d| d.day())
}
