//! beacon-liveness — ephemeral liveness state for Beacon.
//!
//! Tracks the last-heartbeat timestamp per service and the set of
//! services currently believed DOWN. Optimized for high write volume;
//! not durable across restarts — the durable truth lives in
//! `beacon-registry`.
//!
//! The [`LivenessStore`] trait is the capability seam the ingestion and
//! detector paths program against; [`MemoryLivenessStore`] is the
//! in-process implementation used by the standalone daemon and tests.

pub mod error;
pub mod store;

pub use error::{LivenessError, LivenessResult};
pub use store::{LivenessRecord, LivenessStore, MemoryLivenessStore};
