use std::io;

use thiserror::Error;

/// Failures that stop a run before any path is processed.
#[derive(Debug, Error)]
pub enum FileUserError {
    #[error("OS support not present: {0}")]
    OsSupportMissing(&'static str),

    #[error("unable to allocate {0} byte query buffer")]
    BufferAllocation(usize),

    #[error("query buffer of {capacity} bytes cannot hold the {header} byte header")]
    BufferTooSmall { capacity: usize, header: usize },

    #[error("missing argument")]
    MissingArgument,

    #[error("another logger is already installed")]
    LoggerUnavailable,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, FileUserError>;
