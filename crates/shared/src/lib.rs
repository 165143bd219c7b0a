//! # Shared
//! The shared components between the rotation engine and the `rsync-rotate` tool.
//!

#![warn(missing_docs)]

mod logger;

pub use logger::{LoggerError, init_logger};
