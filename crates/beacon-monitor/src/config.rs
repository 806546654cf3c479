//! Monitor configuration.
//!
//! Passed into the detector and ingestion paths at construction time so
//! tests can inject small timeouts.

use std::time::Duration;

/// Timing parameters for the liveness state machine.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Detector tick period.
    pub check_interval: Duration,
    /// Silence strictly greater than this makes a service a candidate failure.
    pub failure_timeout: Duration,
    /// Deadline applied to individual store calls in the detector and
    /// recovery paths so a stalled store cannot stall the loop.
    pub op_deadline: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            failure_timeout: Duration::from_secs(10),
            op_deadline: Duration::from_secs(2),
        }
    }
}

impl MonitorConfig {
    pub fn new(check_interval: Duration, failure_timeout: Duration, op_deadline: Duration) -> Self {
        Self {
            check_interval,
            failure_timeout,
            op_deadline,
        }
    }

    /// Failure timeout in milliseconds, the unit liveness timestamps use.
    pub fn failure_timeout_ms(&self) -> u64 {
        self.failure_timeout.as_millis() as u64
    }
}
