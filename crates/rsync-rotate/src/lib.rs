//! # rsync-rotate
//! Rotation backups using rsync.
//!
//! Each run transfers the source into a new timestamped snapshot directory under the destination,
//! then deletes the snapshots the retention policy no longer keeps.
//!

mod config;
mod context;
mod lock;
pub mod rotate;
pub mod store;
pub mod transfer;

pub use config::{Config, LOCK_FILE_NAME, LoadConfigError, RsyncConfig, SaveConfigError};
pub use context::Context;
pub use lock::{LockError, LockFile};
pub use rotate::{ApplyReport, RunError, RunSummary, apply_plan, plan_rotation, rotate, run};
