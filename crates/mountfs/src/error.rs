//! Error type for mount and stream operations.
//!
//! Every fallible operation in this crate returns [`VfsResult`]. There is no
//! shared last-error slot: the diagnostic that callers need (which operation
//! failed, and what the backend said about it) travels inside [`VfsError`].

use std::io;
use thiserror::Error;

/// Result type for VFS operations.
pub type VfsResult<T> = Result<T, VfsError>;

/// VFS operation errors.
#[derive(Debug, Error)]
pub enum VfsError {
    /// A source could not be opened or recognized as a mountable backend.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// No mounted backend contains the requested virtual path.
    #[error("not found: {0}")]
    NotFound(String),

    /// A precondition violation by the caller, not a backend failure.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A seek resolved to a position before the start of the file.
    #[error("seek before start of file (target {target})")]
    SeekOutOfRange {
        /// The computed absolute target that fell below zero.
        target: i64,
    },

    /// A backend I/O fault, tagged with the operation that hit it.
    #[error("{op}: {source}")]
    Io {
        /// The stream or table operation that was in progress.
        op: &'static str,
        /// The backend's own diagnostic.
        source: io::Error,
    },

    /// Operation attempted on a stream that has already been closed.
    #[error("stream is closed")]
    Closed,
}

impl VfsError {
    /// Wrap a backend error with the name of the operation that hit it.
    pub fn io(op: &'static str, source: io::Error) -> Self {
        VfsError::Io { op, source }
    }
}

impl From<VfsError> for io::Error {
    fn from(err: VfsError) -> Self {
        match err {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::SeekOutOfRange { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err.to_string())
            }
            VfsError::Io { source, .. } => source,
            VfsError::Closed => io::Error::new(io::ErrorKind::NotConnected, "stream is closed"),
            VfsError::BackendUnavailable(msg) => io::Error::other(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_carries_operation_name() {
        let err = VfsError::io("read", io::Error::other("disk on fire"));
        assert_eq!(err.to_string(), "read: disk on fire");
    }

    #[test]
    fn seek_error_reports_target() {
        let err = VfsError::SeekOutOfRange { target: -3 };
        assert!(err.to_string().contains("-3"));
    }

    #[test]
    fn converts_to_io_error_kind() {
        let err: io::Error = VfsError::NotFound("res/a.txt".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
