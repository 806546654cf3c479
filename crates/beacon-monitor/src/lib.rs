//! beacon-monitor — the liveness state machine.
//!
//! Joins the ephemeral liveness store and the durable registry into one
//! logical state machine without a cross-store transaction: the detector
//! logs the durable incident before mutating ephemeral state, every
//! durable write is idempotent, and the down-set test-and-delete is the
//! sole synchronization point between the DOWN and UP paths.
//!
//! # Architecture
//!
//! ```text
//! HeartbeatIngestor (concurrent callers, HTTP ingest surface)
//!   ├── LivenessStore.record_heartbeat (unconditional overwrite)
//!   └── LivenessStore.clear_down — atomic; winner enqueues a
//!       RecoveryJob → RecoveryWorker (detached, at-least-once)
//!             ├── StatusRegistry.mark_service_up
//!             ├── StatusRegistry.append_incident (CAME_UP)
//!             └── LivenessStore.clear_down (defensive re-clear)
//!
//! FailureDetector (single task, fixed tick, serialized scans)
//!   ├── LivenessStore.snapshot
//!   └── per candidate (silence strictly > failure_timeout):
//!       append_incident (WENT_DOWN) → mark_service_down →
//!       mark_down + remove_record
//! ```
//!
//! Failure policy: a failed or timed-out step leaves the candidate's
//! liveness record in place, so silence only grows and the next tick
//! retries — at-least-once incident logging, duplicate incidents as the
//! accepted trade. Nothing in this crate is fatal to the process.

pub mod agent;
pub mod config;
pub mod detector;
pub mod error;
pub mod ingest;
pub mod recovery;
pub mod server;

pub use agent::{AgentConfig, HeartbeatAgent};
pub use config::MonitorConfig;
pub use detector::FailureDetector;
pub use error::{MonitorError, MonitorResult};
pub use ingest::HeartbeatIngestor;
pub use recovery::{RecoveryJob, RecoveryWorker, recovery_channel};
pub use server::{HeartbeatRequest, HeartbeatResponse, build_ingest_router};
