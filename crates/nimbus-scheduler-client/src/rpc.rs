//! Boundary to the remote scheduler service.
//!
//! `SchedulerRpc` is one call per method against the scheduler's messaging
//! topic. Implementations own the transport and its timeouts; a call that
//! gets no reply in time must come back as `RpcError::Timeout` so the query
//! client can tell it apart from real failures.

use std::collections::BTreeMap;

use nimbus_core::RequestContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub type RpcResult<T> = Result<T, RpcError>;

/// Failures reported by a `SchedulerRpc` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// No reply arrived within the transport's response window.
    #[error("timed out waiting for a reply to {method}")]
    Timeout { method: String },

    /// The scheduler handled the call and returned an error.
    #[error("scheduler returned an error for {method}: {message}")]
    Remote { method: String, message: String },

    /// The call could not be delivered (broker down, connection reset).
    #[error("scheduler unreachable: {0}")]
    Unavailable(String),
}

impl RpcError {
    pub fn timeout(method: impl Into<String>) -> Self {
        RpcError::Timeout {
            method: method.into(),
        }
    }

    pub fn remote(method: impl Into<String>, message: impl Into<String>) -> Self {
        RpcError::Remote {
            method: method.into(),
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }
}

/// Scheduler service calls, one remote round trip each.
pub trait SchedulerRpc: Send + Sync {
    /// Ask the scheduler to pick hosts for the request.
    fn select_destinations(
        &self,
        ctx: &RequestContext,
        request_spec: &RequestSpec,
        filter_properties: &FilterProperties,
    ) -> RpcResult<Vec<Destination>>;

    /// Push updated aggregate membership to the scheduler.
    fn update_aggregates(&self, ctx: &RequestContext, aggregates: &[Aggregate]) -> RpcResult<()>;

    /// Tell the scheduler an aggregate is gone.
    fn delete_aggregate(&self, ctx: &RequestContext, aggregate: &Aggregate) -> RpcResult<()>;
}

// ── Payloads ──────────────────────────────────────────────────────

/// Placement request, forwarded to the scheduler without interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestSpec(pub Value);

/// Scheduler filter hints, forwarded without interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterProperties(pub Value);

/// A host chosen by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub host: String,
    pub nodename: String,
    /// Oversubscription limits the chosen host must honour.
    #[serde(default)]
    pub limits: BTreeMap<String, Value>,
}

impl Destination {
    pub fn new(host: impl Into<String>, nodename: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            nodename: nodename.into(),
            limits: BTreeMap::new(),
        }
    }
}

/// A named group of hosts used for scheduling policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub id: u64,
    pub name: String,
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Aggregate {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            availability_zone: None,
            hosts: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}
