use core::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};

/// A retention tier.
///
/// Tiers are ordered from the finest granularity to the coarsest.
#[repr(u8)]
#[derive(Hash, Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// One snapshot is retained per hour.
    Hourly = 0,

    /// One snapshot is retained per calendar day.
    Daily = 1,

    /// One snapshot is retained per ISO week, weeks start on Monday.
    Weekly = 2,

    /// One snapshot is retained per calendar month.
    Monthly = 3,

    /// One snapshot is retained per calendar year.
    Yearly = 4,
}

impl Tier {
    /// Every tier, finest first.
    pub const ALL: [Self; 5] = [
        Self::Hourly,
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Yearly,
    ];

    /// The tier's name as used in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// The start of the sub-period of this tier that contains `timestamp`.
    ///
    /// Two timestamps fall in the same sub-period exactly when their period starts are equal.
    pub fn period_start(&self, timestamp: NaiveDateTime) -> NaiveDateTime {
        let date = timestamp.date();

        match self {
            Self::Hourly => {
                date.and_time(NaiveTime::MIN) + TimeDelta::hours(i64::from(timestamp.hour()))
            }
            Self::Daily => date.and_time(NaiveTime::MIN),
            Self::Weekly => {
                let days_into_week = date.weekday().num_days_from_monday();
                (date - TimeDelta::days(i64::from(days_into_week))).and_time(NaiveTime::MIN)
            }
            Self::Monthly => {
                (date - TimeDelta::days(i64::from(date.day0()))).and_time(NaiveTime::MIN)
            }
            Self::Yearly => {
                (date - TimeDelta::days(i64::from(date.ordinal0()))).and_time(NaiveTime::MIN)
            }
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!("invalid tier '{s}'")),
        }
    }
}
