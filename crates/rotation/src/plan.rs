use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{RetentionPolicy, Snapshot, Tier};

/// Why a snapshot was kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retention {
    /// The snapshot represents one of the tier's retained sub-periods.
    Tier(Tier),

    /// The snapshot is dated after the time the plan was made for.
    Future,
}

/// A snapshot the plan keeps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retained {
    /// The kept snapshot.
    pub snapshot: Snapshot,

    /// Why it was kept.
    pub retention: Retention,
}

/// The snapshots to keep and to delete. Both are ordered newest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPlan {
    /// The snapshots to keep.
    pub keep: Vec<Retained>,

    /// The snapshots to delete.
    pub delete: Vec<Snapshot>,
}

impl RotationPlan {
    /// If the plan deletes nothing.
    pub fn is_noop(&self) -> bool {
        self.delete.is_empty()
    }

    /// The kept snapshots without their retention reasons.
    pub fn kept_snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.keep.iter().map(|retained| &retained.snapshot)
    }

    /// The kept snapshots retained by a given tier.
    pub fn kept_by(&self, tier: Tier) -> impl Iterator<Item = &Snapshot> {
        self.keep
            .iter()
            .filter(move |retained| retained.retention == Retention::Tier(tier))
            .map(|retained| &retained.snapshot)
    }
}

/// Decide which snapshots to keep and which to delete at `now`.
///
/// Tiers are processed from finest to coarsest. Each tier takes the newest remaining snapshots,
/// keeps the newest snapshot of each of its first `count` sub-periods and deletes the other
/// snapshots inside those sub-periods. Anything older than the start of the tier's oldest kept
/// sub-period is left for the next tier. Whatever is left after the last tier is deleted.
///
/// Incomplete snapshots are always deleted. Snapshots dated after `now` are always kept.
pub fn plan(
    now: NaiveDateTime,
    snapshots: Vec<Snapshot>,
    policy: &RetentionPolicy,
) -> RotationPlan {
    let mut plan = RotationPlan::default();
    let mut candidates = Vec::with_capacity(snapshots.len());

    for snapshot in snapshots {
        if !snapshot.complete {
            trace!("Deleting incomplete snapshot {:?}", snapshot.path);
            plan.delete.push(snapshot);
        } else if snapshot.timestamp > now {
            trace!("Keeping future snapshot {:?}", snapshot.path);
            plan.keep.push(Retained {
                snapshot,
                retention: Retention::Future,
            });
        } else {
            candidates.push(snapshot);
        }
    }

    // Newest first, ties keep their input order.
    candidates.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    for tier in Tier::ALL {
        let count = policy.count(tier);
        let mut retained = 0;
        let mut last_period = None;
        let mut older = Vec::new();

        for snapshot in candidates {
            let period = tier.period_start(snapshot.timestamp);

            if last_period == Some(period) {
                // An older snapshot in a sub-period that already has its representative.
                plan.delete.push(snapshot);
            } else if retained < count {
                retained += 1;
                last_period = Some(period);
                plan.keep.push(Retained {
                    snapshot,
                    retention: Retention::Tier(tier),
                });
            } else {
                older.push(snapshot);
            }
        }

        trace!("Tier {tier} retained {retained} of {count}");
        candidates = older;
    }

    // Older than every tier's boundary.
    plan.delete.extend(candidates);

    plan.keep.sort_by(|a, b| b.snapshot.timestamp.cmp(&a.snapshot.timestamp));
    plan.delete.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    plan
}
