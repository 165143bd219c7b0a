//! # common
//!

#![allow(dead_code)]

use std::{fs, path::Path};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rotation::{RetentionPolicy, Snapshot};
use rsync_rotate::{Config, store::SnapshotStore};

pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 15)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap()
}

pub fn aged(hours: i64) -> NaiveDateTime {
    now() - TimeDelta::hours(hours)
}

pub fn test_config(destination: &Path) -> Config {
    Config {
        source: "/srv/source".to_string(),
        destination: destination.to_path_buf(),
        retention: RetentionPolicy {
            hourly: 2,
            daily: 3,
            ..RetentionPolicy::NONE
        },
        ..Config::default()
    }
}

pub fn make_snapshot(store: &SnapshotStore, timestamp: NaiveDateTime) -> Snapshot {
    let path = store.snapshot_path(timestamp);
    fs::create_dir_all(path.join("data")).unwrap();
    fs::write(path.join("data").join("file"), "Contents").unwrap();

    Snapshot::new(timestamp, path)
}

pub fn make_partial(store: &SnapshotStore, timestamp: NaiveDateTime) -> Snapshot {
    let path = store.partial_path(timestamp);
    fs::create_dir_all(&path).unwrap();

    Snapshot::incomplete(timestamp, path)
}
