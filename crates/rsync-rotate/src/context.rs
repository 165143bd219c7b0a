use core::fmt::Display;
use std::path::PathBuf;

/// Holds the context for the current run. Used for prefixing logs.
#[derive(Default, Debug)]
pub struct Context {
    /// The destination being rotated.
    pub destination: Option<PathBuf>,
    /// The current context
    pub current_context: &'static str,
}

impl Context {
    /// Create a context for a destination.
    pub fn new(destination: PathBuf) -> Self {
        Self {
            destination: Some(destination),
            current_context: "Start",
        }
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(destination) = &self.destination {
            write!(f, "[{}] ", destination.display())?;
        }

        write!(f, "[{}] ", self.current_context)?;

        Ok(())
    }
}
