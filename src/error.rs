// src/error.rs
//! Crate-wide error type.
//!
//! Every fallible operation returns [`Result`]. Size-class errors carry both the
//! observed and the expected shape so the message is enough to diagnose a job.

use std::path::PathBuf;

/// Errors raised by contractions, block I/O and the blocked engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Tensor dimensions fail a precondition of a contraction primitive or a copy.
    #[error("shape mismatch in {op}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Operation that rejected its operands.
        op: &'static str,
        /// Expected shape.
        expected: Vec<usize>,
        /// Observed shape.
        got: Vec<usize>,
    },

    /// On-disk dataset dimensions disagree with the declared ones, or the chunk
    /// shape does not divide the dataset extents.
    #[error("size mismatch: {context} (got {got:?}, expected {expected:?})")]
    SizeMismatch {
        context: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },

    /// A storage operation was invoked in a build without the storage backend.
    #[error("{0} needs the chunked storage backend (build with feature `io`)")]
    IoUnsupported(&'static str),

    /// Filesystem failure, propagated verbatim.
    #[error("I/O failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Container-level failure: corrupt header, checksum mismatch, missing dataset.
    #[error("storage failure on {}: {reason}", .path.display())]
    Storage { path: PathBuf, reason: String },

    /// Metadata or container header could not be (de)serialised.
    #[error("metadata serialisation failed: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Engine, grid or sampler configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// This rank succeeded but another rank of the grid failed in the same phase.
    #[error("another rank failed during {0}")]
    RankFailed(&'static str),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    #[inline]
    pub(crate) fn shape(op: &'static str, expected: &[usize], got: &[usize]) -> Self {
        Error::ShapeMismatch {
            op,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    #[inline]
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    #[inline]
    pub(crate) fn storage(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Storage { path: path.into(), reason: reason.into() }
    }
}
