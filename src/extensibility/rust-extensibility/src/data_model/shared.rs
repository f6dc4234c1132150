use chrono::TimeDelta;
use nutype::nutype;
use thiserror::Error;

static QUOTIENTS: [i64; 7] = [1000, 1000, 1000, 60, 60, 24, 1];
static POST_FIXES: [&str; 7] = ["ns", "us", "ms", "s", "min", "h", "d"];

/// Nanoseconds per unit, index-aligned with POST_FIXES.
static MULTIPLIERS: [i64; 7] = [
    1,
    1_000,
    1_000_000,
    1_000_000_000,
    60 * 1_000_000_000,
    3_600 * 1_000_000_000,
    86_400 * 1_000_000_000,
];

#[nutype(
    derive(AsRef, Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd),
    validate(predicate = |x| *x > TimeDelta::zero() && x.num_nanoseconds().is_some()),
)]
pub struct SamplePeriod(TimeDelta);

impl SamplePeriod {
    /// The period length in whole nanoseconds.
    pub fn as_nanos(&self) -> i64 {
        self.as_ref().num_nanoseconds().unwrap_or(i64::MAX)
    }

    /// Creates a sample period from whole nanoseconds.
    pub fn from_nanos(nanos: i64) -> Result<Self, SamplePeriodError> {
        SamplePeriod::try_new(TimeDelta::nanoseconds(nanos))
    }

    /// Converts the period into a human readable number string with unit.
    pub fn to_unit_string(&self) -> String {
        let mut current_value = self.as_nanos();

        for i in 0..POST_FIXES.len() {
            let quotient = current_value / QUOTIENTS[i];
            let remainder = current_value % QUOTIENTS[i];

            if remainder != 0 {
                return format!("{}_{}", current_value, POST_FIXES[i]);
            } else {
                current_value = quotient;
            }
        }

        format!("{}_{}", current_value, POST_FIXES[POST_FIXES.len() - 1])
    }

    /// Parses a unit string of the form `{n}_{unit}` with `unit` being one of
    /// `ns`, `us`, `ms`, `s`, `min`, `h` and `d`.
    pub fn from_unit_string(value: &str) -> Result<Self, ParseUnitStringError> {
        let (number_part, unit_part) = value
            .split_once('_')
            .ok_or_else(|| ParseUnitStringError::MissingUnit(value.to_string()))?;

        let number = number_part
            .parse::<i64>()
            .map_err(|_| ParseUnitStringError::InvalidNumber(value.to_string()))?;

        let unit_index = POST_FIXES
            .iter()
            .position(|postfix| *postfix == unit_part)
            .ok_or_else(|| ParseUnitStringError::InvalidUnit(value.to_string()))?;

        let nanos = number
            .checked_mul(MULTIPLIERS[unit_index])
            .ok_or_else(|| ParseUnitStringError::OutOfRange(value.to_string()))?;

        SamplePeriod::from_nanos(nanos)
            .map_err(|_| ParseUnitStringError::OutOfRange(value.to_string()))
    }
}

/// An error which occurs when a unit string cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseUnitStringError {
    /// The unit part is missing.
    #[error("the unit string {0} has no unit part")]
    MissingUnit(String),

    /// The number part is not a positive integer.
    #[error("the unit string {0} has an invalid number part")]
    InvalidNumber(String),

    /// The unit part is unknown.
    #[error("the unit string {0} has an invalid unit part")]
    InvalidUnit(String),

    /// The resulting period is zero or too large.
    #[error("the unit string {0} describes a period outside the valid range")]
    OutOfRange(String),
}
