//! Snapshot directories on disk.
//!

use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use chrono::{NaiveDateTime, Timelike};
use rotation::Snapshot;
use thiserror::Error;
use tracing::{debug, warn};

use crate::Context;

/// The `chrono` format of snapshot directory names.
pub const SNAPSHOT_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Appended to a snapshot's name while it is being transferred.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// The symlink pointing at the newest complete snapshot.
pub const LATEST_LINK: &str = "latest";

/// The snapshot directories inside a destination.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at a destination directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The destination directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the destination directory if it is missing.
    pub fn create_root(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|e| StoreError::Io(e, "create destination"))
    }

    /// The directory name for a snapshot taken at `timestamp`.
    pub fn snapshot_name(timestamp: NaiveDateTime) -> String {
        timestamp.format(SNAPSHOT_FORMAT).to_string()
    }

    /// Parse a directory name into a snapshot timestamp and if the snapshot is complete.
    pub fn parse_name(name: &str) -> Option<(NaiveDateTime, bool)> {
        let (name, complete) = match name.strip_suffix(PARTIAL_SUFFIX) {
            Some(name) => (name, false),
            None => (name, true),
        };

        let timestamp = NaiveDateTime::parse_from_str(name, SNAPSHOT_FORMAT).ok()?;

        Some((timestamp, complete))
    }

    /// The directory a snapshot taken at `timestamp` is transferred into.
    pub fn partial_path(&self, timestamp: NaiveDateTime) -> PathBuf {
        let name = format!("{}{PARTIAL_SUFFIX}", Self::snapshot_name(timestamp));
        self.root.join(name)
    }

    /// The directory of a complete snapshot taken at `timestamp`.
    pub fn snapshot_path(&self, timestamp: NaiveDateTime) -> PathBuf {
        self.root.join(Self::snapshot_name(timestamp))
    }

    /// List every snapshot directory, complete or partial, newest first.
    pub fn list(&self, context: &Context) -> Result<Vec<Snapshot>, StoreError> {
        let directory =
            fs::read_dir(&self.root).map_err(|e| StoreError::Io(e, "read destination"))?;

        let mut snapshots: Vec<Snapshot> = directory
            .filter_map(|entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(error) => {
                        warn!("{context}Could not read entry: {error}");
                        return None;
                    }
                };
                let path = entry.path();

                // Does not follow symlinks, so the latest link is skipped here.
                let file_type = match entry.file_type() {
                    Ok(file_type) => file_type,
                    Err(error) => {
                        warn!("{context}Could not get entry '{path:?}' file type: {error}");
                        return None;
                    }
                };

                if !file_type.is_dir() {
                    return None;
                }

                let name = entry.file_name();
                let Some((timestamp, complete)) = name.to_str().and_then(Self::parse_name) else {
                    debug!("{context}Ignoring directory {path:?}");
                    return None;
                };

                Some(Snapshot {
                    timestamp,
                    path,
                    complete,
                })
            })
            .collect();

        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(snapshots)
    }

    /// Mark the partial snapshot taken at `timestamp` as complete.
    pub fn complete(&self, timestamp: NaiveDateTime) -> Result<Snapshot, StoreError> {
        let partial = self.partial_path(timestamp);
        let path = self.snapshot_path(timestamp);

        if path.exists() {
            return Err(StoreError::AlreadyExists(path));
        }

        fs::rename(&partial, &path).map_err(|e| StoreError::Io(e, "rename partial snapshot"))?;

        // Names have second precision.
        let timestamp = timestamp.with_nanosecond(0).unwrap_or(timestamp);

        Ok(Snapshot::new(timestamp, path))
    }

    /// Delete a snapshot directory.
    pub fn remove(&self, snapshot: &Snapshot) -> Result<(), DeleteError> {
        if snapshot.path.parent() != Some(self.root.as_path()) {
            return Err(DeleteError::OutsideStore(snapshot.path.clone()));
        }

        fs::remove_dir_all(&snapshot.path).map_err(DeleteError::Remove)
    }

    /// Point the latest link at `snapshot`, or remove the link if there is none.
    pub fn update_latest(&self, snapshot: Option<&Snapshot>) -> Result<(), StoreError> {
        let link = self.root.join(LATEST_LINK);

        let Some(snapshot) = snapshot else {
            return match fs::remove_file(&link) {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
                Err(error) => Err(StoreError::Io(error, "remove latest link")),
            };
        };

        let Some(target) = snapshot.path.file_name() else {
            return Err(StoreError::InvalidSnapshotPath(snapshot.path.clone()));
        };

        link_latest(&self.root, Path::new(target))
    }
}

#[cfg(unix)]
fn link_latest(root: &Path, target: &Path) -> Result<(), StoreError> {
    let link = root.join(LATEST_LINK);
    let staging = root.join(format!("{LATEST_LINK}.new"));

    match fs::remove_file(&staging) {
        Ok(()) => {}
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => return Err(StoreError::Io(error, "remove stale latest link")),
    }

    // Relative, so the destination can be moved.
    std::os::unix::fs::symlink(target, &staging)
        .map_err(|e| StoreError::Io(e, "create latest link"))?;
    fs::rename(&staging, &link).map_err(|e| StoreError::Io(e, "replace latest link"))?;

    Ok(())
}

#[cfg(not(unix))]
fn link_latest(_root: &Path, _target: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to {1}: {0}")]
    Io(#[source] io::Error, &'static str),

    #[error("The destination {0:?} does not exist")]
    MissingDestination(PathBuf),

    #[error("A snapshot already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("Snapshot path {0:?} has no directory name")]
    InvalidSnapshotPath(PathBuf),
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("Refusing to delete {0:?}, it is not inside the destination")]
    OutsideStore(PathBuf),

    #[error("Failed to remove the snapshot directory: {0}")]
    Remove(#[source] io::Error),
}
