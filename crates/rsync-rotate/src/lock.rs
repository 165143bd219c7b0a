use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use thiserror::Error;
use tracing::{debug, warn};

/// An exclusive lock on a destination, held until dropped.
///
/// The lock is an advisory lock on the lock file, so the OS releases it when the holder exits for
/// any reason, including being killed. The file itself stays in place and contains the process id
/// of the last holder.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    file: File,
}

impl LockFile {
    /// Try to take the lock.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        // Not truncated on open, the holder's process id must survive a failed attempt.
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(LockError::Create)?;

        if let Err(error) = file.try_lock_exclusive() {
            if error.kind() == fs2::lock_contended_error().kind() {
                return Err(LockError::Held(path.to_path_buf()));
            }
            return Err(LockError::Lock(error));
        }

        file.set_len(0).map_err(LockError::Write)?;
        writeln!(file, "{}", std::process::id()).map_err(LockError::Write)?;
        debug!("Acquired lock {path:?}");

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// The path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        // Closing the file releases the lock too, unlocking first makes it visible immediately.
        match FileExt::unlock(&self.file) {
            Ok(()) => debug!("Released lock {:?}", self.path),
            Err(error) => warn!("Could not unlock {:?}: {error}", self.path),
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LockError {
    #[error("The lock file {0:?} is held by another run")]
    Held(PathBuf),

    #[error("Failed to open the lock file:\n{0}")]
    Create(#[source] io::Error),

    #[error("Failed to lock the lock file:\n{0}")]
    Lock(#[source] io::Error),

    #[error("Failed to write the lock file:\n{0}")]
    Write(#[source] io::Error),
}
