//! Error types for the Beacon monitor paths.

use thiserror::Error;

use beacon_liveness::LivenessError;

/// Result type alias for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors surfaced by the heartbeat ingestion path.
///
/// Only liveness-store failures and precondition violations reach the
/// caller; recovery and detector failures are absorbed and logged.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Service id `0` is reserved-invalid.
    #[error("invalid service id: {0}")]
    InvalidServiceId(u64),

    #[error(transparent)]
    Liveness(#[from] LivenessError),
}
