//! Error types for the Beacon liveness store.

use thiserror::Error;

/// Result type alias for liveness store operations.
pub type LivenessResult<T> = Result<T, LivenessError>;

/// Errors that can occur during liveness store operations.
///
/// The in-memory store is infallible; the variants exist for external
/// backends and for failure injection in tests.
#[derive(Debug, Error)]
pub enum LivenessError {
    #[error("liveness backend error: {0}")]
    Backend(String),
}
