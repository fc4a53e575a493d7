//! Facade lifecycle.
//!
//! A facade is `Open` after construction and ends in exactly one of two
//! terminal states:
//!
//! ```text
//!            close()            close()
//!   Open ─────────────▶ Closed ◀────────┐
//!    │                     └────────────┘
//!    │ detach()
//!    ▼
//!   Detached
//! ```
//!
//! A detached facade is neither open nor closed: the handle still exists, it
//! is just no longer reachable through the facade.

use crate::error::{Result, ThreadIoError};

/// Lifecycle state of a facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Operations are dispatched to the wrapped handle.
    #[default]
    Open,
    /// The handle was closed; only `close` is still accepted.
    Closed,
    /// The handle was released to the caller.
    Detached,
}

impl Lifecycle {
    /// Fail with the matching usage error unless the facade is open.
    pub fn ensure_open(self, operation: &'static str) -> Result<()> {
        match self {
            Self::Open => Ok(()),
            Self::Closed => Err(ThreadIoError::closed(operation)),
            Self::Detached => Err(ThreadIoError::detached(operation)),
        }
    }

    /// Whether the facade reports itself as closed.
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }

    /// Whether the handle has been detached.
    pub fn is_detached(self) -> bool {
        self == Self::Detached
    }

    /// Decide what a `close` call must do.
    ///
    /// Returns `Ok(true)` when the handle has to be closed, `Ok(false)` when
    /// the facade is already closed and the call is a no-op.
    pub fn begin_close(self) -> Result<bool> {
        match self {
            Self::Open => Ok(true),
            Self::Closed => Ok(false),
            Self::Detached => Err(ThreadIoError::detached("close")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_accepts_everything() {
        assert!(Lifecycle::Open.ensure_open("read").is_ok());
        assert_eq!(Lifecycle::Open.begin_close().ok(), Some(true));
        assert!(!Lifecycle::default().is_closed());
    }

    #[test]
    fn test_closed_rejects_all_but_close() {
        let err = Lifecycle::Closed.ensure_open("write").unwrap_err();
        assert!(matches!(err, ThreadIoError::Closed { operation: "write" }));
        assert_eq!(Lifecycle::Closed.begin_close().ok(), Some(false));
        assert!(Lifecycle::Closed.is_closed());
    }

    #[test]
    fn test_detached_rejects_close() {
        let err = Lifecycle::Detached.ensure_open("read").unwrap_err();
        assert!(matches!(err, ThreadIoError::Detached { .. }));
        assert!(Lifecycle::Detached.begin_close().is_err());
        assert!(Lifecycle::Detached.is_detached());
        assert!(!Lifecycle::Detached.is_closed());
    }
}
