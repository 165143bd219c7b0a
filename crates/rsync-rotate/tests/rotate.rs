//! Tests for running and rotating
//!

use std::fs;

use chrono::TimeDelta;
use common::{aged, make_partial, make_snapshot, now, test_config};
use rotation::{RotationPlan, Snapshot};
use rsync_rotate::{
    Context, LOCK_FILE_NAME, LockError, LockFile, RunError, apply_plan, rotate, run,
    store::{DeleteError, SnapshotStore, StoreError},
    transfer::{MOCK_FILE, Mock, TransferError},
};
use shared::test::init_test_logger;

mod common;

#[test]
fn run_creates_snapshot() {
    let _logger = init_test_logger();
    let destination = tempfile::tempdir().unwrap();
    let config = test_config(destination.path());
    let store = SnapshotStore::new(config.destination.clone());
    let transfer = Mock::default();

    let mut context = Context::default();
    let summary = run(&mut context, &config, &transfer, now()).unwrap();

    let created = summary.created.unwrap();
    assert_eq!(created.path, store.snapshot_path(now()));
    assert_eq!(
        fs::read_to_string(created.path.join(MOCK_FILE)).unwrap(),
        "/srv/source"
    );
    assert!(!store.partial_path(now()).exists());
    drop(LockFile::acquire(&destination.path().join(LOCK_FILE_NAME)).unwrap());

    let calls = transfer.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, store.partial_path(now()));
    assert_eq!(calls[0].2, None);

    #[cfg(unix)]
    assert_eq!(
        fs::read_link(destination.path().join("latest")).unwrap(),
        std::path::PathBuf::from("2024-06-15_12-30-00")
    );
}

#[test]
fn run_creates_missing_destination() {
    let _logger = init_test_logger();
    let parent = tempfile::tempdir().unwrap();
    let config = test_config(&parent.path().join("nested").join("backups"));

    let mut context = Context::default();
    let summary = run(&mut context, &config, &Mock::default(), now()).unwrap();

    assert!(summary.created.unwrap().path.exists());
}

#[test]
fn run_links_against_newest_snapshot() {
    let _logger = init_test_logger();
    let destination = tempfile::tempdir().unwrap();
    let config = test_config(destination.path());
    let store = SnapshotStore::new(config.destination.clone());
    make_snapshot(&store, aged(3));
    let newest = make_snapshot(&store, aged(1));
    make_partial(&store, aged(0) - TimeDelta::minutes(10));

    let transfer = Mock::default();
    let mut context = Context::default();
    run(&mut context, &config, &transfer, now()).unwrap();

    let calls = transfer.calls.borrow();
    assert_eq!(calls[0].2.as_ref(), Some(&newest.path));
}

#[test]
fn run_without_link_dest() {
    let _logger = init_test_logger();
    let destination = tempfile::tempdir().unwrap();
    let mut config = test_config(destination.path());
    config.rsync.link_dest = false;
    let store = SnapshotStore::new(config.destination.clone());
    make_snapshot(&store, aged(1));

    let transfer = Mock::default();
    let mut context = Context::default();
    run(&mut context, &config, &transfer, now()).unwrap();

    assert_eq!(transfer.calls.borrow()[0].2, None);
}

#[test]
fn run_skips_transfer_within_min_interval() {
    let _logger = init_test_logger();
    let destination = tempfile::tempdir().unwrap();
    let mut config = test_config(destination.path());
    config.min_interval_minutes = Some(60);
    let store = SnapshotStore::new(config.destination.clone());
    make_snapshot(&store, now() - TimeDelta::minutes(30));

    let transfer = Mock::default();
    let mut context = Context::default();
    let summary = run(&mut context, &config, &transfer, now()).unwrap();

    assert!(summary.created.is_none());
    assert!(transfer.calls.borrow().is_empty());
    assert!(summary.report.unwrap().is_success());
}

#[test]
fn run_transfers_after_min_interval() {
    let _logger = init_test_logger();
    let destination = tempfile::tempdir().unwrap();
    let mut config = test_config(destination.path());
    config.min_interval_minutes = Some(60);
    let store = SnapshotStore::new(config.destination.clone());
    make_snapshot(&store, aged(2));

    let mut context = Context::default();
    let summary = run(&mut context, &config, &Mock::default(), now()).unwrap();

    assert!(summary.created.is_some());
}

#[test]
fn transfer_failure_is_fatal_and_releases_lock() {
    let _logger = init_test_logger();
    let destination = tempfile::tempdir().unwrap();
    let config = test_config(destination.path());
    let store = SnapshotStore::new(config.destination.clone());
    let existing = make_snapshot(&store, aged(1));

    let mut context = Context::default();
    let result = run(&mut context, &config, &Mock::failing(), now());

    assert!(matches!(
        result,
        Err(RunError::Transfer(TransferError::CommandErrored { code: 23, .. }))
    ));
    drop(LockFile::acquire(&destination.path().join(LOCK_FILE_NAME)).unwrap());
    assert!(store.partial_path(now()).exists());
    assert!(existing.path.exists());

    // The next run removes the abandoned partial snapshot.
    let later = now() + TimeDelta::hours(1);
    let summary = run(&mut context, &config, &Mock::default(), later).unwrap();

    assert!(!store.partial_path(now()).exists());
    let removed = summary.report.unwrap().removed;
    assert!(removed.iter().any(|snapshot| !snapshot.complete));
}

#[test]
fn run_fails_when_locked() {
    let _logger = init_test_logger();
    let destination = tempfile::tempdir().unwrap();
    let config = test_config(destination.path());
    let lock_path = destination.path().join(LOCK_FILE_NAME);
    let _held = LockFile::acquire(&lock_path).unwrap();

    let transfer = Mock::default();
    let mut context = Context::default();
    let result = run(&mut context, &config, &transfer, now());

    assert!(matches!(result, Err(RunError::Lock(LockError::Held(_)))));
    assert!(transfer.calls.borrow().is_empty());
    let store = SnapshotStore::new(config.destination.clone());
    assert!(store.list(&context).unwrap().is_empty());
}

#[test]
fn rotate_applies_plan() {
    let _logger = init_test_logger();
    let destination = tempfile::tempdir().unwrap();
    let config = test_config(destination.path());
    let store = SnapshotStore::new(config.destination.clone());
    let snapshots: Vec<_> = [1, 2, 3, 25, 49, 73]
        .into_iter()
        .map(|hours| make_snapshot(&store, aged(hours)))
        .collect();

    let mut context = Context::default();
    let summary = rotate(&mut context, &config, now(), false).unwrap();

    let report = summary.report.unwrap();
    assert!(report.is_success());
    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0].path, snapshots[5].path);

    let remaining = store.list(&context).unwrap();
    assert_eq!(remaining, snapshots[..5].to_vec());

    // Rotating again at the same time changes nothing.
    let summary = rotate(&mut context, &config, now(), false).unwrap();
    assert!(summary.plan.is_noop());
    assert!(summary.report.unwrap().removed.is_empty());
}

#[test]
fn rotate_dry_run_deletes_nothing() {
    let _logger = init_test_logger();
    let destination = tempfile::tempdir().unwrap();
    let config = test_config(destination.path());
    let store = SnapshotStore::new(config.destination.clone());
    for hours in [1, 2, 3, 25, 49, 73] {
        make_snapshot(&store, aged(hours));
    }

    let mut context = Context::default();
    let summary = rotate(&mut context, &config, now(), true).unwrap();

    assert!(summary.report.is_none());
    assert_eq!(summary.plan.delete.len(), 1);
    assert_eq!(store.list(&context).unwrap().len(), 6);
}

#[test]
fn rotate_missing_destination() {
    let _logger = init_test_logger();
    let parent = tempfile::tempdir().unwrap();
    let config = test_config(&parent.path().join("missing"));

    let mut context = Context::default();
    let result = rotate(&mut context, &config, now(), false);

    assert!(matches!(
        result,
        Err(RunError::Store(StoreError::MissingDestination(_)))
    ));
}

#[test]
fn apply_plan_continues_after_failure() {
    let _logger = init_test_logger();
    let destination = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(destination.path().to_path_buf());

    let missing = Snapshot::new(aged(5), store.snapshot_path(aged(5)));
    let outside = Snapshot::new(aged(6), destination.path().join("nested").join("x"));
    let existing = make_snapshot(&store, aged(7));

    let plan = RotationPlan {
        keep: Vec::new(),
        delete: vec![missing.clone(), outside.clone(), existing.clone()],
    };

    let mut context = Context::default();
    let report = apply_plan(&mut context, &store, &plan);

    assert!(!report.is_success());
    assert_eq!(report.removed, vec![existing.clone()]);
    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.failed[0].0, missing);
    assert!(matches!(report.failed[0].1, DeleteError::Remove(_)));
    assert!(matches!(report.failed[1].1, DeleteError::OutsideStore(_)));
    assert!(!existing.path.exists());
}

#[cfg(unix)]
#[test]
fn rotate_succeeds_when_a_deletion_fails() {
    use std::os::unix::fs::PermissionsExt;

    let _logger = init_test_logger();
    let destination = tempfile::tempdir().unwrap();
    let config = test_config(destination.path());
    let store = SnapshotStore::new(config.destination.clone());
    let snapshots: Vec<_> = [1, 2, 3, 25, 49, 73]
        .into_iter()
        .map(|hours| make_snapshot(&store, aged(hours)))
        .collect();

    let data = snapshots[5].path.join("data");
    fs::set_permissions(&data, fs::Permissions::from_mode(0o555)).unwrap();

    // Permissions do not apply to root, the deletion would succeed.
    if fs::write(data.join("writable"), "").is_ok() {
        fs::set_permissions(&data, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let mut context = Context::default();
    let result = rotate(&mut context, &config, now(), false);
    fs::set_permissions(&data, fs::Permissions::from_mode(0o755)).unwrap();

    let report = result.unwrap().report.unwrap();
    assert!(!report.is_success());
    assert!(report.removed.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0.path, snapshots[5].path);
    assert!(matches!(report.failed[0].1, DeleteError::Remove(_)));
}

#[test]
fn second_run_in_the_same_second_skips_transfer() {
    let _logger = init_test_logger();
    let destination = tempfile::tempdir().unwrap();
    let config = test_config(destination.path());
    let store = SnapshotStore::new(config.destination.clone());

    let mut context = Context::default();
    run(&mut context, &config, &Mock::default(), now()).unwrap();

    let transfer = Mock::default();
    let summary = run(&mut context, &config, &transfer, now()).unwrap();

    assert!(summary.created.is_none());
    assert!(transfer.calls.borrow().is_empty());
    assert!(!store.partial_path(now()).exists());
    assert!(store.snapshot_path(now()).exists());
}
