use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::Context;

use super::{Transfer, TransferError};

/// The file a mock transfer writes into each snapshot.
pub const MOCK_FILE: &str = "mock";

/// Mock a transfer.
///
/// Creates the target directory with a single file containing the source. Records every call.
#[derive(Debug, Default)]
pub struct Mock {
    /// Fail every transfer after creating the target.
    pub fail: bool,

    /// `(source, target, link_dest)` of each call.
    pub calls: RefCell<Vec<(String, PathBuf, Option<PathBuf>)>>,
}

impl Mock {
    /// A mock whose transfers fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl Transfer for Mock {
    fn transfer(
        &self,
        context: &Context,
        source: &str,
        target: &Path,
        link_dest: Option<&Path>,
    ) -> Result<(), TransferError> {
        self.calls.borrow_mut().push((
            source.to_string(),
            target.to_path_buf(),
            link_dest.map(Path::to_path_buf),
        ));

        fs::create_dir_all(target).map_err(TransferError::RunCommand)?;

        if self.fail {
            return Err(TransferError::CommandErrored {
                code: 23,
                stderr: "mock transfer failed".to_string(),
            });
        }

        fs::write(target.join(MOCK_FILE), source).map_err(TransferError::RunCommand)?;
        info!("{context}Mock transfer into {target:?}");

        Ok(())
    }
}
