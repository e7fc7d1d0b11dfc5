use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Supported candle timeframes of the normalized schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1H")]
    OneHour,
    #[serde(rename = "4H")]
    FourHours,
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "15D")]
    FifteenDays,
}

impl Timeframe {
    pub const ALL: [Self; 9] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::FourHours,
        Self::OneDay,
        Self::OneWeek,
        Self::FifteenDays,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1H",
            Self::FourHours => "4H",
            Self::OneDay => "1D",
            Self::OneWeek => "1W",
            Self::FifteenDays => "15D",
        }
    }

    pub const fn minutes(self) -> u32 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinutes => 5,
            Self::FifteenMinutes => 15,
            Self::ThirtyMinutes => 30,
            Self::OneHour => 60,
            Self::FourHours => 240,
            Self::OneDay => 1_440,
            Self::OneWeek => 10_080,
            Self::FifteenDays => 21_600,
        }
    }

    pub const fn seconds(self) -> u64 {
        self.minutes() as u64 * 60
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        // minutes stay lowercase; hours, days and weeks accept either case
        let normalized = match trimmed.strip_suffix('m') {
            Some(_) => trimmed.to_owned(),
            None => trimmed.to_ascii_uppercase(),
        };

        Self::ALL
            .into_iter()
            .find(|timeframe| timeframe.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidTimeframe {
                value: trimmed.to_owned(),
            })
    }
}
