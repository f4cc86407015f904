//! Shared types used across Nimbus crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller context threaded through every scheduler and store call.
///
/// The client layer never inspects it; it is handed to collaborators as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub is_admin: bool,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            user_id: None,
            project_id: None,
            is_admin: false,
        }
    }

    /// An administrative context with no user or project bound to it.
    pub fn admin() -> Self {
        Self {
            request_id: "req-admin".to_string(),
            user_id: None,
            project_id: None,
            is_admin: true,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.project_id = Some(project_id.into());
        self
    }
}

/// The `(host, nodename)` pair that identifies a compute node to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostIdentity {
    pub host: String,
    pub nodename: String,
}

impl HostIdentity {
    pub fn new(host: impl Into<String>, nodename: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            nodename: nodename.into(),
        }
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.nodename)
    }
}
