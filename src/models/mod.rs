//! Closed domain vocabulary of the commission engine.
//!
//! Status values and adjustment types arrive on the wire as strings; they are
//! parsed into these enums at the handler boundary and rejected there when
//! unknown, so service code only ever sees legal values.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::errors::ServiceError;

/// Lifecycle states of a single commission record.
///
/// ```text
/// PENDING ──► APPROVED ──► LOCKED
///    │            │
///    └────────────┴──► REVERSED
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Locked,
    Reversed,
}

impl CommissionStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: CommissionStatus) -> bool {
        use CommissionStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Approved, Locked) | (Pending, Reversed) | (Approved, Reversed)
        )
    }

    /// LOCKED and REVERSED commissions accept no further mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, CommissionStatus::Locked | CommissionStatus::Reversed)
    }

    /// Adjustments are legal only while the commission is still payable
    /// and not frozen.
    pub fn is_adjustable(self) -> bool {
        matches!(self, CommissionStatus::Pending | CommissionStatus::Approved)
    }
}

/// Lifecycle states of a monthly summary. Independent of the commission
/// state machine: locking a summary never cascades to its constituents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryStatus {
    Pending,
    Approved,
    Locked,
}

impl SummaryStatus {
    pub fn can_transition_to(self, next: SummaryStatus) -> bool {
        use SummaryStatus::*;
        matches!((self, next), (Pending, Approved) | (Approved, Locked))
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SummaryStatus::Locked)
    }
}

/// How a commission amount is derived from the eligible base amount.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionType {
    Percentage,
    FixedAmount,
}

impl CommissionType {
    /// Computes the payable amount at calculation time.
    ///
    /// Percentage rates are applied against the base amount and rounded
    /// half-up to two decimal places; fixed rates are the amount itself.
    pub fn compute_amount(self, base_amount: Decimal, rate: Decimal) -> Decimal {
        match self {
            CommissionType::Percentage => (base_amount * rate / dec!(100))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            CommissionType::FixedAmount => {
                rate.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            }
        }
    }
}

/// Audit classification of an amount adjustment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentType {
    ManualAdjustment,
    Bonus,
    Correction,
    Refund,
    Cancellation,
    PriceChange,
}

/// Parses a status/type string persisted in the database back into its enum.
/// A failure here means a corrupt row, not bad user input.
pub fn parse_stored<T: FromStr>(column: &str, raw: &str) -> Result<T, ServiceError> {
    raw.parse()
        .map_err(|_| ServiceError::InternalError(format!("corrupt {} value '{}'", column, raw)))
}

/// A calendar month in UTC, the scope key for summaries (`YYYY-MM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, ServiceError> {
        if !(1..=12).contains(&month) {
            return Err(ServiceError::ValidationError(format!(
                "month out of range: {}",
                month
            )));
        }
        if !(2000..=9999).contains(&year) {
            return Err(ServiceError::ValidationError(format!(
                "year out of range: {}",
                year
            )));
        }
        Ok(Self { year, month })
    }

    pub fn of(instant: DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }

    pub fn current() -> Self {
        Self::of(Utc::now())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn number(&self) -> u32 {
        self.month
    }

    /// First instant of the month.
    pub fn start(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .expect("first day of month is always valid")
    }

    /// First instant of the following month; `[start, end)` is the scope.
    pub fn end(&self) -> DateTime<Utc> {
        let (y, m) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0)
            .single()
            .expect("first day of month is always valid")
    }

    /// The three months of a calendar quarter (1-4).
    pub fn quarter_months(year: i32, quarter: u32) -> Result<Vec<Month>, ServiceError> {
        if !(1..=4).contains(&quarter) {
            return Err(ServiceError::ValidationError(format!(
                "quarter out of range: {}",
                quarter
            )));
        }
        let first = (quarter - 1) * 3 + 1;
        (first..first + 3).map(|m| Month::new(year, m)).collect()
    }

    pub fn year_months(year: i32) -> Result<Vec<Month>, ServiceError> {
        (1..=12).map(|m| Month::new(year, m)).collect()
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ServiceError::ValidationError(format!("invalid month '{}', expected YYYY-MM", s));
        let (y, m) = s.split_once('-').ok_or_else(bad)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(bad());
        }
        let year: i32 = y.parse().map_err(|_| bad())?;
        let month: u32 = m.parse().map_err(|_| bad())?;
        Month::new(year, month)
    }
}

impl Serialize for Month {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
