//! Error types for threadio operations.
//!
//! Errors fall into a handful of categories so callers can tell apart
//! "the file handle is gone" from "the I/O itself failed":
//!
//! - I/O errors from the wrapped blocking primitive, passed through untouched
//! - usage errors on a closed or detached facade
//! - unsupported operations (e.g. detaching a handle that has no inner layer)
//! - argument validation errors raised before any work is dispatched
//! - worker failures (a job panicked or no worker pool was available)

use std::io;
use thiserror::Error;

/// The main error type for threadio operations.
#[derive(Debug, Error)]
pub enum ThreadIoError {
    /// I/O error from the wrapped blocking primitive.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The facade has been closed.
    #[error("I/O operation on closed file: {operation}")]
    Closed {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// The facade has released its handle through `detach`.
    #[error("underlying stream has been detached: {operation}")]
    Detached {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// The wrapped resource does not support the operation.
    #[error("unsupported operation {operation}: {reason}")]
    Unsupported {
        /// The operation that was attempted.
        operation: &'static str,
        /// Why the resource cannot perform it.
        reason: String,
    },

    /// A previous call that was cancelled still owns the handle on a worker.
    #[error("{operation} while a previous call is still running on a worker")]
    Busy {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// Invalid open mode string.
    #[error("invalid mode: {mode:?} ({reason})")]
    InvalidMode {
        /// The offending mode string.
        mode: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Compression level outside of 0..=9.
    #[error("invalid compression level: {level} (expected 0..=9)")]
    InvalidLevel {
        /// The rejected level.
        level: i64,
    },

    /// Unknown or unusable text encoding.
    #[error("invalid encoding {label:?}: {reason}")]
    InvalidEncoding {
        /// The encoding label as given.
        label: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Any other rejected argument.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// The worker running a job failed.
    #[error("worker failure: {message}")]
    Worker {
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for threadio operations.
pub type Result<T> = std::result::Result<T, ThreadIoError>;

/// Coarse classification of a [`ThreadIoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The blocking I/O call failed.
    Io,
    /// The facade is closed or detached.
    InvalidState,
    /// The operation is not supported by the resource.
    Unsupported,
    /// An argument was rejected before dispatch.
    InvalidArgument,
    /// The worker failed to run the job, or a cancelled job still runs.
    Worker,
}

impl ThreadIoError {
    /// Create a closed-facade error.
    pub fn closed(operation: &'static str) -> Self {
        Self::Closed { operation }
    }

    /// Create a detached-facade error.
    pub fn detached(operation: &'static str) -> Self {
        Self::Detached { operation }
    }

    /// Create an unsupported operation error.
    pub fn unsupported(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            operation,
            reason: reason.into(),
        }
    }

    /// Create a busy error.
    pub fn busy(operation: &'static str) -> Self {
        Self::Busy { operation }
    }

    /// Create an invalid mode error.
    pub fn invalid_mode(mode: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMode {
            mode: mode.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid compression level error.
    pub fn invalid_level(level: i64) -> Self {
        Self::InvalidLevel { level }
    }

    /// Create an invalid encoding error.
    pub fn invalid_encoding(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEncoding {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a worker failure error.
    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }

    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Io(_) => ErrorCategory::Io,
            Self::Closed { .. } | Self::Detached { .. } => ErrorCategory::InvalidState,
            Self::Unsupported { .. } => ErrorCategory::Unsupported,
            Self::InvalidMode { .. }
            | Self::InvalidLevel { .. }
            | Self::InvalidEncoding { .. }
            | Self::InvalidArgument { .. } => ErrorCategory::InvalidArgument,
            Self::Busy { .. } | Self::Worker { .. } => ErrorCategory::Worker,
        }
    }

    /// True when the facade is closed or detached.
    pub fn is_invalid_state(&self) -> bool {
        self.category() == ErrorCategory::InvalidState
    }

    /// The [`io::ErrorKind`] of a wrapped I/O error.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io(err) => Some(err.kind()),
            _ => None,
        }
    }
}
