//! beacon-registry — durable registry for Beacon.
//!
//! Backed by [redb](https://docs.rs/redb), holds the authoritative
//! status row for every monitored service plus the append-only incident
//! log that audits each WENT_DOWN / CAME_UP transition.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value
//! columns under `u64` keys. Row ids come from monotonic counters in a
//! meta table, bumped inside the same write transaction as the insert.
//!
//! The `RegistryStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks. The liveness
//! core consumes it through the narrow [`StatusRegistry`] trait so tests
//! can inject store failures.

pub mod error;
pub mod status;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{RegistryError, RegistryResult};
pub use status::StatusRegistry;
pub use store::RegistryStore;
pub use types::*;
