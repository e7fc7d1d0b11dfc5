use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ValidationError;

const MIN_YEAR: i32 = 2009;
const MAX_YEAR: i32 = 2050;

/// UTC timestamp in milliseconds, guaranteed to fall within 2009..=2050.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct UtcMillis(i64);

impl UtcMillis {
    pub fn now() -> Self {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        Self((nanos / 1_000_000) as i64)
    }

    pub fn from_millis(millis: i64) -> Result<Self, ValidationError> {
        let datetime = OffsetDateTime::from_unix_timestamp(millis.div_euclid(1_000))
            .map_err(|_| ValidationError::InvalidTimestamp { value: millis })?;

        let year = datetime.year();
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(ValidationError::TimestampOutOfEra { year });
        }

        Ok(Self(millis))
    }

    pub fn from_seconds(seconds: i64) -> Result<Self, ValidationError> {
        let millis = seconds
            .checked_mul(1_000)
            .ok_or(ValidationError::InvalidTimestamp { value: seconds })?;
        Self::from_millis(millis)
    }

    /// Fractional seconds as sent by Kraken (`1567039620.1234`).
    pub fn from_fractional_seconds(seconds: f64) -> Result<Self, ValidationError> {
        if !seconds.is_finite() {
            return Err(ValidationError::InvalidField {
                field: "timestamp",
                value: seconds.to_string(),
            });
        }
        Self::from_millis((seconds * 1_000.0).round() as i64)
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }

    pub const fn as_seconds(self) -> i64 {
        self.0.div_euclid(1_000)
    }
}

impl Display for UtcMillis {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for UtcMillis {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_millis(value)
    }
}

impl From<UtcMillis> for i64 {
    fn from(value: UtcMillis) -> Self {
        value.0
    }
}
