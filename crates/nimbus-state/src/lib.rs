//! nimbus-state — compute node record store for Nimbus.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for compute node resource records.
//!
//! # Architecture
//!
//! Records are JSON-serialized into redb's `&[u8]` value column and keyed by
//! a numeric id drawn from a persisted sequence. Each `ComputeNode` tracks
//! which of its fields were modified since the last reset; saving merges
//! only those fields into the stored copy.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).
//! Consumers that only need fetch/save depend on the `ComputeNodeStore`
//! trait instead.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{FieldError, StateError, StateResult};
pub use store::{ComputeNodeStore, StateStore};
pub use types::*;
