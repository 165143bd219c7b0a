//! Transfers that fill a new snapshot directory.
//!

use std::{io, path::Path};

use thiserror::Error;

use crate::Context;

mod mock;
mod rsync;

pub use mock::{MOCK_FILE, Mock};
pub use rsync::Rsync;

/// Copies a source tree into a snapshot directory.
pub trait Transfer {
    /// Copy `source` into `target`, creating `target`.
    ///
    /// `link_dest` is the previous complete snapshot, unchanged files may be hard linked to it.
    fn transfer(
        &self,
        context: &Context,
        source: &str,
        target: &Path,
        link_dest: Option<&Path>,
    ) -> Result<(), TransferError>;
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Failed to run command:\n{0}")]
    RunCommand(#[source] io::Error),

    #[error("Failed to resolve the link destination path:\n{0}")]
    ResolveLinkDest(#[source] io::Error),

    #[error("Command exited with status {code}:\n{stderr}")]
    CommandErrored { code: i32, stderr: String },

    #[error("Command was terminated by a signal:\n{0}")]
    Terminated(String),
}
