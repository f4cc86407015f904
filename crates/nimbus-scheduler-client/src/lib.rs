//! nimbus-scheduler-client — client-side access to the scheduler service.
//!
//! Two independent halves behind one façade:
//!
//! - **Query**: asks the remote scheduler for destinations and forwards
//!   aggregate changes. Destination selection retries once on a messaging
//!   timeout; nothing else is retried.
//! - **Report**: reconciles host resource reports onto compute node records
//!   through a `ComputeNodeStore`.
//!
//! # Architecture
//!
//! ```text
//! SchedulerClient
//!   ├── LazyLoader<QueryClient>
//!   │     └── SchedulerRpc (remote scheduler, with RetryPolicy)
//!   └── LazyLoader<ReportClient>
//!         └── ComputeNodeStore (fetch → patch → save)
//! ```

pub mod client;
pub mod error;
pub mod lazy;
pub mod query;
pub mod report;
pub mod retry;
pub mod rpc;

pub use client::SchedulerClient;
pub use error::{SchedulerError, SchedulerResult};
pub use lazy::LazyLoader;
pub use query::QueryClient;
pub use report::{ReportClient, ResourceStats, StatsPatch};
pub use retry::{AttemptOutcome, RetryPolicy, RetryState, Step};
pub use rpc::{
    Aggregate, Destination, FilterProperties, RequestSpec, RpcError, RpcResult, SchedulerRpc,
};
