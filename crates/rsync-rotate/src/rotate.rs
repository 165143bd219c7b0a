//! Transfer a new snapshot and rotate the old ones.
//!

use chrono::NaiveDateTime;
use rotation::{RetentionPolicy, RotationPlan, Snapshot};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    Config, Context, LockError, LockFile,
    store::{DeleteError, SnapshotStore, StoreError},
    transfer::{Transfer, TransferError},
};

/// The outcome of applying a plan's deletions.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// The snapshots that were deleted.
    pub removed: Vec<Snapshot>,

    /// The snapshots that could not be deleted.
    pub failed: Vec<(Snapshot, DeleteError)>,
}

impl ApplyReport {
    /// If every deletion succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The outcome of a run.
#[derive(Debug)]
pub struct RunSummary {
    /// The snapshot created by this run, if the transfer was due.
    pub created: Option<Snapshot>,

    /// The rotation plan that was computed.
    pub plan: RotationPlan,

    /// The deletions, `None` for a dry run.
    pub report: Option<ApplyReport>,
}

/// Transfer a new snapshot into the destination, then rotate.
///
/// The transfer is skipped if the newest complete snapshot is younger than the configured minimum
/// interval. Configuration, lock, listing and transfer failures abort the run, failed deletions are
/// logged and reported in the summary.
pub fn run(
    context: &mut Context,
    config: &Config,
    transfer: &impl Transfer,
    now: NaiveDateTime,
) -> Result<RunSummary, RunError> {
    context.current_context = "Run";

    let store = SnapshotStore::new(config.destination.clone());
    store.create_root()?;
    let _lock = LockFile::acquire(&config.lock_path())?;

    let snapshots = store.list(context)?;
    let newest = newest_complete(&snapshots);

    let created = if is_transfer_due(context, config, &store, newest, now) {
        Some(transfer_snapshot(context, config, &store, transfer, newest, now)?)
    } else {
        None
    };

    let (plan, report) = rotate_locked(context, &store, &config.retention, now, false)?;

    Ok(RunSummary {
        created,
        plan,
        report,
    })
}

/// Rotate the destination's snapshots without transferring a new one.
pub fn rotate(
    context: &mut Context,
    config: &Config,
    now: NaiveDateTime,
    dry_run: bool,
) -> Result<RunSummary, RunError> {
    context.current_context = "Rotate";

    let store = SnapshotStore::new(config.destination.clone());
    if !store.root().is_dir() {
        return Err(StoreError::MissingDestination(config.destination.clone()).into());
    }
    let _lock = LockFile::acquire(&config.lock_path())?;

    let (plan, report) = rotate_locked(context, &store, &config.retention, now, dry_run)?;

    Ok(RunSummary {
        created: None,
        plan,
        report,
    })
}

/// Compute the plan for the destination's current snapshots without changing anything.
pub fn plan_rotation(
    context: &mut Context,
    config: &Config,
    now: NaiveDateTime,
) -> Result<RotationPlan, RunError> {
    context.current_context = "Plan";

    let store = SnapshotStore::new(config.destination.clone());
    let snapshots = store.list(context)?;

    Ok(rotation::plan(now, snapshots, &config.retention))
}

/// Delete the plan's snapshots one at a time.
///
/// A failed deletion is logged and recorded, the remaining deletions still run.
pub fn apply_plan(
    context: &mut Context,
    store: &SnapshotStore,
    plan: &RotationPlan,
) -> ApplyReport {
    context.current_context = "Delete";

    let mut report = ApplyReport::default();

    for snapshot in &plan.delete {
        match store.remove(snapshot) {
            Ok(()) => {
                info!("{context}Deleted {:?}", snapshot.path);
                report.removed.push(snapshot.clone());
            }
            Err(error) => {
                error!("{context}Could not delete {:?}: {error}", snapshot.path);
                report.failed.push((snapshot.clone(), error));
            }
        }
    }

    report
}

fn rotate_locked(
    context: &mut Context,
    store: &SnapshotStore,
    policy: &RetentionPolicy,
    now: NaiveDateTime,
    dry_run: bool,
) -> Result<(RotationPlan, Option<ApplyReport>), RunError> {
    if policy.retains_nothing() {
        warn!("{context}Every tier count is zero, all past snapshots will be deleted");
    }

    let snapshots = store.list(context)?;
    let plan = rotation::plan(now, snapshots, policy);

    for retained in &plan.keep {
        info!(
            "{context}Keeping {:?} ({:?})",
            retained.snapshot.path, retained.retention
        );
    }

    if dry_run {
        for snapshot in &plan.delete {
            info!("{context}Would delete {:?}", snapshot.path);
        }

        return Ok((plan, None));
    }

    let report = apply_plan(context, store, &plan);

    context.current_context = "Latest";
    let newest = plan
        .kept_snapshots()
        .find(|snapshot| snapshot.complete && snapshot.timestamp <= now);
    if let Err(error) = store.update_latest(newest) {
        warn!("{context}Could not update the latest link: {error}");
    }

    if report.is_success() {
        info!("{context}Deleted {} snapshots", report.removed.len());
    } else {
        warn!(
            "{context}Deleted {} snapshots, {} could not be deleted",
            report.removed.len(),
            report.failed.len()
        );
    }

    Ok((plan, Some(report)))
}

fn transfer_snapshot(
    context: &mut Context,
    config: &Config,
    store: &SnapshotStore,
    transfer: &impl Transfer,
    newest: Option<&Snapshot>,
    now: NaiveDateTime,
) -> Result<Snapshot, RunError> {
    context.current_context = "Transfer";

    let target = store.partial_path(now);
    let link_dest = newest
        .filter(|_| config.rsync.link_dest)
        .map(|snapshot| snapshot.path.as_path());

    info!("{context}Transferring '{}' into {target:?}", config.source);

    if let Err(error) = transfer.transfer(context, &config.source, &target, link_dest) {
        error!("{context}Transfer failed, {target:?} is left for the next rotation: {error}");
        return Err(error.into());
    }

    let snapshot = store.complete(now)?;
    info!("{context}Created {:?}", snapshot.path);

    if let Err(error) = store.update_latest(Some(&snapshot)) {
        warn!("{context}Could not update the latest link: {error}");
    }

    Ok(snapshot)
}

fn is_transfer_due(
    context: &Context,
    config: &Config,
    store: &SnapshotStore,
    newest: Option<&Snapshot>,
    now: NaiveDateTime,
) -> bool {
    // Same second, or a local time repeated when the clock goes back.
    let existing = store.snapshot_path(now);
    if existing.exists() {
        info!("{context}Snapshot {existing:?} already exists, skipping transfer");
        return false;
    }

    let (Some(min_interval), Some(newest)) = (config.min_interval_minutes, newest) else {
        return true;
    };

    // A snapshot from the future counts as brand new.
    let elapsed = u64::try_from((now - newest.timestamp).num_minutes()).unwrap_or(0);

    if elapsed < min_interval {
        info!(
            "{context}Newest snapshot {:?} is {elapsed} minutes old, skipping transfer",
            newest.path
        );
        return false;
    }

    true
}

fn newest_complete(snapshots: &[Snapshot]) -> Option<&Snapshot> {
    snapshots
        .iter()
        .filter(|snapshot| snapshot.complete)
        .max_by_key(|snapshot| snapshot.timestamp)
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to lock the destination:\n{0}")]
    Lock(#[from] LockError),

    #[error("Failed to access the snapshots:\n{0}")]
    Store(#[from] StoreError),

    #[error("Failed to transfer the snapshot:\n{0}")]
    Transfer(#[from] TransferError),
}
