use serde::{Deserialize, Serialize};

use crate::Tier;

/// The number of snapshots to retain in each tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// The number of hourly snapshots to keep.
    pub hourly: u32,

    /// The number of daily snapshots to keep.
    pub daily: u32,

    /// The number of weekly snapshots to keep.
    pub weekly: u32,

    /// The number of monthly snapshots to keep.
    pub monthly: u32,

    /// The number of yearly snapshots to keep.
    pub yearly: u32,
}

impl RetentionPolicy {
    /// A policy that retains nothing.
    pub const NONE: Self = Self {
        hourly: 0,
        daily: 0,
        weekly: 0,
        monthly: 0,
        yearly: 0,
    };

    /// The number of snapshots to retain for a given tier.
    pub fn count(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Hourly => self.hourly,
            Tier::Daily => self.daily,
            Tier::Weekly => self.weekly,
            Tier::Monthly => self.monthly,
            Tier::Yearly => self.yearly,
        }
    }

    /// If this policy retains no snapshots at all.
    pub fn retains_nothing(&self) -> bool {
        Tier::ALL.iter().all(|tier| self.count(*tier) == 0)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            hourly: 24,
            daily: 7,
            weekly: 4,
            monthly: 12,
            yearly: 10,
        }
    }
}
