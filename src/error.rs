use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Everything that can go wrong during a run.
///
/// Only [`Error::InvalidInput`] stops a run. Every other variant is recorded
/// against the run and processing carries on with the next item.
#[derive(Debug, Error)]
pub enum Error {
    /// The scan root does not exist or cannot be listed.
    #[error("cannot open input path '{path}': {source}")]
    InvalidInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single entry could not be visited while walking.
    #[error("failed to walk '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Opening, reading, deleting or moving a file failed.
    #[error("I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A move would overwrite an existing file.
    #[error("refusing to overwrite existing file '{0}'")]
    TargetExists(PathBuf),

    /// A path selected for moving does not live under the scan root.
    #[error("'{path}' is not under the scan root '{root}'")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// The worker pool could not be built or a worker panicked.
    #[error("worker pool failure: {0}")]
    Worker(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Path the error is about, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::InvalidInput { path, .. }
            | Self::Walk { path, .. }
            | Self::Io { path, .. }
            | Self::OutsideRoot { path, .. } => Some(path),
            Self::TargetExists(path) => Some(path),
            Self::Worker(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
