//! Shared error taxonomy
//!
//! The cross-service error surface. Transient errors are the only
//! retryable class; everything else surfaces to the caller and leaves
//! the system in its pre-call state.

use thiserror::Error;

/// Errors crossing service boundaries inside the solver.
#[derive(Error, Debug)]
pub enum SolverError {
    /// Lookup-for-update of a missing entity. Not retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate decision or re-match of a matched offer. Terminal for
    /// the request.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed or inconsistent input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Log write, chain RPC, or socket failure; retried with bounded
    /// backoff by the caller.
    #[error("transient i/o: {0}")]
    Transient(String),

    /// A submitted chain call reverted. The transition is not recorded.
    #[error("chain rejected: {0}")]
    ChainRejected(String),

    /// A persisted record failed to parse during replay.
    #[error("corrupt record: {0}")]
    Corruption(String),

    /// Unrecoverable initialization failure; aborts startup.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl SolverError {
    /// Whether local retry with backoff is appropriate.
    pub fn is_transient(&self) -> bool {
        matches!(self, SolverError::Transient(_) | SolverError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_detail() {
        let err = SolverError::Conflict("match already exists".into());
        assert_eq!(err.to_string(), "conflict: match already exists");
    }

    #[test]
    fn test_transient_classification() {
        assert!(SolverError::Transient("rpc timeout".into()).is_transient());
        assert!(!SolverError::NotFound("deal d1".into()).is_transient());
        assert!(!SolverError::ChainRejected("reverted".into()).is_transient());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: SolverError = io.into();
        assert!(err.is_transient());
    }
}
