use std::{
    ffi::OsString,
    path::{self, Path},
    process::Command,
};

use tracing::{debug, info, warn};

use crate::{Context, RsyncConfig};

use super::{Transfer, TransferError};

/// Transfer using the rsync binary.
#[derive(Debug, Clone)]
pub struct Rsync {
    config: RsyncConfig,
}

impl Rsync {
    /// Create a transfer from the config's rsync section.
    pub fn new(config: RsyncConfig) -> Self {
        Self { config }
    }

    /// The arguments rsync is run with.
    pub fn arguments(
        &self,
        source: &str,
        target: &Path,
        link_dest: Option<&Path>,
    ) -> Result<Vec<OsString>, TransferError> {
        let mut arguments: Vec<OsString> =
            self.config.arguments.iter().map(OsString::from).collect();

        for pattern in &self.config.excludes {
            arguments.push(format!("--exclude={pattern}").into());
        }

        // rsync resolves a relative link destination against the target.
        if let Some(link_dest) = link_dest {
            let link_dest = path::absolute(link_dest).map_err(TransferError::ResolveLinkDest)?;
            let mut argument = OsString::from("--link-dest=");
            argument.push(link_dest);
            arguments.push(argument);
        }

        // Trailing slashes copy the contents of the source into the target.
        arguments.push(with_trailing_slash(source.into()));
        arguments.push(with_trailing_slash(target.as_os_str().to_owned()));

        Ok(arguments)
    }
}

impl Transfer for Rsync {
    fn transfer(
        &self,
        context: &Context,
        source: &str,
        target: &Path,
        link_dest: Option<&Path>,
    ) -> Result<(), TransferError> {
        let arguments = self.arguments(source, target, link_dest)?;
        debug!("{context}Running {:?} {arguments:?}", self.config.binary);

        let output = Command::new(&self.config.binary)
            .args(&arguments)
            .output()
            .map_err(TransferError::RunCommand)?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!("{context}rsync: {line}");
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        match output.status.code() {
            Some(0) => {
                info!("{context}Transfer finished");
                Ok(())
            }
            Some(code) if self.config.accepted_exit_codes.contains(&code) => {
                warn!("{context}rsync exited with accepted status {code}: {stderr}");
                Ok(())
            }
            Some(code) => Err(TransferError::CommandErrored { code, stderr }),
            None => Err(TransferError::Terminated(stderr)),
        }
    }
}

fn with_trailing_slash(mut path: OsString) -> OsString {
    if !path.as_encoded_bytes().ends_with(b"/") {
        path.push("/");
    }

    path
}
