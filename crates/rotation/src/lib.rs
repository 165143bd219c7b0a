//! # rotation
//! Decides which backup snapshots to keep under a tiered retention policy.
//!
//! The engine does no I/O. Callers list their snapshots, call [`plan`] and apply the resulting
//! [`RotationPlan`] themselves.
//!

mod plan;
mod policy;
mod snapshot;
mod tier;

pub use plan::{Retained, Retention, RotationPlan, plan};
pub use policy::RetentionPolicy;
pub use snapshot::Snapshot;
pub use tier::Tier;
