//! Scheduler client error types.

use nimbus_state::{FieldError, StateError};
use thiserror::Error;

use crate::rpc::RpcError;

/// Errors surfaced by the scheduler client.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The stats payload does not say which compute node it belongs to.
    #[error("compute host {0} needs to be created first before updating")]
    ComputeHostNotCreated(String),

    #[error("invalid resource stats: {0}")]
    InvalidStats(#[from] FieldError),

    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("scheduler rpc error: {0}")]
    Rpc(#[from] RpcError),
}

impl SchedulerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SchedulerError::Rpc(e) if e.is_timeout())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SchedulerError::State(e) if e.is_not_found())
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
