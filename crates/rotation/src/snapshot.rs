use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One backup of the source tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken. Identifies the snapshot.
    pub timestamp: NaiveDateTime,

    /// The snapshot's directory.
    pub path: PathBuf,

    /// If the transfer into this snapshot finished.
    pub complete: bool,
}

impl Snapshot {
    /// Creates a complete snapshot.
    pub fn new(timestamp: NaiveDateTime, path: PathBuf) -> Self {
        Self {
            timestamp,
            path,
            complete: true,
        }
    }

    /// Creates a snapshot whose transfer never finished.
    pub fn incomplete(timestamp: NaiveDateTime, path: PathBuf) -> Self {
        Self {
            timestamp,
            path,
            complete: false,
        }
    }
}
