//! Domain types for the Nimbus state store.
//!
//! A `ComputeNode` is the persisted resource record of one hypervisor node.
//! Its mutable attributes form a closed schema (`ComputeNodeField`); updates
//! arrive as typed `FieldUpdate`s so nothing outside that schema can be
//! written. The record remembers which fields were modified since the last
//! `reset_changes`, and the store persists only those.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FieldError;

/// Numeric primary key of a compute node record.
pub type ComputeNodeId = u64;

/// Store-managed keys that callers may never overwrite.
const READ_ONLY_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

// ── Compute node ───────────────────────────────────────────────────

/// Persisted resource record for a single compute node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComputeNode {
    pub id: ComputeNodeId,
    /// Service host that owns the node.
    pub host: String,
    /// Node name as reported by the hypervisor driver.
    pub hypervisor_hostname: String,
    pub host_ip: Option<String>,
    pub hypervisor_type: String,
    pub hypervisor_version: u64,
    /// Driver-specific CPU description (usually JSON text).
    pub cpu_info: String,
    pub vcpus: u32,
    pub vcpus_used: u32,
    pub memory_mb: u64,
    pub memory_mb_used: u64,
    pub free_ram_mb: i64,
    pub local_gb: u64,
    pub local_gb_used: u64,
    pub free_disk_gb: i64,
    pub disk_available_least: Option<i64>,
    pub current_workload: u32,
    pub running_vms: u32,
    /// Free-form driver counters.
    pub stats: BTreeMap<String, Value>,
    /// Unix timestamp (seconds) when the record was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last save.
    pub updated_at: u64,
    #[serde(skip)]
    changes: BTreeSet<ComputeNodeField>,
}

impl ComputeNode {
    /// A blank record for `host`/`hypervisor_hostname` with nothing marked as changed.
    pub fn new(
        id: ComputeNodeId,
        host: impl Into<String>,
        hypervisor_hostname: impl Into<String>,
    ) -> Self {
        Self {
            id,
            host: host.into(),
            hypervisor_hostname: hypervisor_hostname.into(),
            ..Self::default()
        }
    }

    /// Apply a validated update and mark the field as changed.
    pub fn apply(&mut self, update: FieldUpdate) {
        let field = update.field();
        match update {
            FieldUpdate::Host(v) => self.host = v,
            FieldUpdate::HypervisorHostname(v) => self.hypervisor_hostname = v,
            FieldUpdate::HostIp(v) => self.host_ip = v,
            FieldUpdate::HypervisorType(v) => self.hypervisor_type = v,
            FieldUpdate::HypervisorVersion(v) => self.hypervisor_version = v,
            FieldUpdate::CpuInfo(v) => self.cpu_info = v,
            FieldUpdate::Vcpus(v) => self.vcpus = v,
            FieldUpdate::VcpusUsed(v) => self.vcpus_used = v,
            FieldUpdate::MemoryMb(v) => self.memory_mb = v,
            FieldUpdate::MemoryMbUsed(v) => self.memory_mb_used = v,
            FieldUpdate::FreeRamMb(v) => self.free_ram_mb = v,
            FieldUpdate::LocalGb(v) => self.local_gb = v,
            FieldUpdate::LocalGbUsed(v) => self.local_gb_used = v,
            FieldUpdate::FreeDiskGb(v) => self.free_disk_gb = v,
            FieldUpdate::DiskAvailableLeast(v) => self.disk_available_least = v,
            FieldUpdate::CurrentWorkload(v) => self.current_workload = v,
            FieldUpdate::RunningVms(v) => self.running_vms = v,
            FieldUpdate::Stats(v) => self.stats = v,
        }
        self.changes.insert(field);
    }

    /// Current value of `field`, as an update that would reproduce it.
    pub fn value_of(&self, field: ComputeNodeField) -> FieldUpdate {
        use ComputeNodeField as F;
        match field {
            F::Host => FieldUpdate::Host(self.host.clone()),
            F::HypervisorHostname => {
                FieldUpdate::HypervisorHostname(self.hypervisor_hostname.clone())
            }
            F::HostIp => FieldUpdate::HostIp(self.host_ip.clone()),
            F::HypervisorType => FieldUpdate::HypervisorType(self.hypervisor_type.clone()),
            F::HypervisorVersion => FieldUpdate::HypervisorVersion(self.hypervisor_version),
            F::CpuInfo => FieldUpdate::CpuInfo(self.cpu_info.clone()),
            F::Vcpus => FieldUpdate::Vcpus(self.vcpus),
            F::VcpusUsed => FieldUpdate::VcpusUsed(self.vcpus_used),
            F::MemoryMb => FieldUpdate::MemoryMb(self.memory_mb),
            F::MemoryMbUsed => FieldUpdate::MemoryMbUsed(self.memory_mb_used),
            F::FreeRamMb => FieldUpdate::FreeRamMb(self.free_ram_mb),
            F::LocalGb => FieldUpdate::LocalGb(self.local_gb),
            F::LocalGbUsed => FieldUpdate::LocalGbUsed(self.local_gb_used),
            F::FreeDiskGb => FieldUpdate::FreeDiskGb(self.free_disk_gb),
            F::DiskAvailableLeast => FieldUpdate::DiskAvailableLeast(self.disk_available_least),
            F::CurrentWorkload => FieldUpdate::CurrentWorkload(self.current_workload),
            F::RunningVms => FieldUpdate::RunningVms(self.running_vms),
            F::Stats => FieldUpdate::Stats(self.stats.clone()),
        }
    }

    /// Fields modified since the last reset, in schema order.
    pub fn changed_fields(&self) -> impl Iterator<Item = ComputeNodeField> + '_ {
        self.changes.iter().copied()
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Forget pending modifications without touching field values.
    pub fn reset_changes(&mut self) {
        self.changes.clear();
    }
}

/// Attributes required to register a new compute node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewComputeNode {
    pub host: String,
    pub hypervisor_hostname: String,
    pub hypervisor_type: String,
    pub vcpus: u32,
    pub memory_mb: u64,
    pub local_gb: u64,
}

impl NewComputeNode {
    /// Materialize a record with every resource free.
    ///
    /// Free counters are signed; totals beyond `i64::MAX` saturate.
    pub fn into_record(self, id: ComputeNodeId, now: u64) -> ComputeNode {
        ComputeNode {
            id,
            host: self.host,
            hypervisor_hostname: self.hypervisor_hostname,
            hypervisor_type: self.hypervisor_type,
            vcpus: self.vcpus,
            memory_mb: self.memory_mb,
            free_ram_mb: i64::try_from(self.memory_mb).unwrap_or(i64::MAX),
            local_gb: self.local_gb,
            free_disk_gb: i64::try_from(self.local_gb).unwrap_or(i64::MAX),
            created_at: now,
            updated_at: now,
            ..ComputeNode::default()
        }
    }
}

// ── Schema ─────────────────────────────────────────────────────────

/// The mutable attributes of a `ComputeNode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComputeNodeField {
    Host,
    HypervisorHostname,
    HostIp,
    HypervisorType,
    HypervisorVersion,
    CpuInfo,
    Vcpus,
    VcpusUsed,
    MemoryMb,
    MemoryMbUsed,
    FreeRamMb,
    LocalGb,
    LocalGbUsed,
    FreeDiskGb,
    DiskAvailableLeast,
    CurrentWorkload,
    RunningVms,
    Stats,
}

impl ComputeNodeField {
    pub const ALL: [ComputeNodeField; 18] = [
        Self::Host,
        Self::HypervisorHostname,
        Self::HostIp,
        Self::HypervisorType,
        Self::HypervisorVersion,
        Self::CpuInfo,
        Self::Vcpus,
        Self::VcpusUsed,
        Self::MemoryMb,
        Self::MemoryMbUsed,
        Self::FreeRamMb,
        Self::LocalGb,
        Self::LocalGbUsed,
        Self::FreeDiskGb,
        Self::DiskAvailableLeast,
        Self::CurrentWorkload,
        Self::RunningVms,
        Self::Stats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::HypervisorHostname => "hypervisor_hostname",
            Self::HostIp => "host_ip",
            Self::HypervisorType => "hypervisor_type",
            Self::HypervisorVersion => "hypervisor_version",
            Self::CpuInfo => "cpu_info",
            Self::Vcpus => "vcpus",
            Self::VcpusUsed => "vcpus_used",
            Self::MemoryMb => "memory_mb",
            Self::MemoryMbUsed => "memory_mb_used",
            Self::FreeRamMb => "free_ram_mb",
            Self::LocalGb => "local_gb",
            Self::LocalGbUsed => "local_gb_used",
            Self::FreeDiskGb => "free_disk_gb",
            Self::DiskAvailableLeast => "disk_available_least",
            Self::CurrentWorkload => "current_workload",
            Self::RunningVms => "running_vms",
            Self::Stats => "stats",
        }
    }
}

impl fmt::Display for ComputeNodeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComputeNodeField {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if READ_ONLY_FIELDS.contains(&s) {
            return Err(FieldError::ReadOnly(s.to_string()));
        }
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| FieldError::Unknown(s.to_string()))
    }
}

/// A type-checked new value for one `ComputeNodeField`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Host(String),
    HypervisorHostname(String),
    HostIp(Option<String>),
    HypervisorType(String),
    HypervisorVersion(u64),
    CpuInfo(String),
    Vcpus(u32),
    VcpusUsed(u32),
    MemoryMb(u64),
    MemoryMbUsed(u64),
    FreeRamMb(i64),
    LocalGb(u64),
    LocalGbUsed(u64),
    FreeDiskGb(i64),
    DiskAvailableLeast(Option<i64>),
    CurrentWorkload(u32),
    RunningVms(u32),
    Stats(BTreeMap<String, Value>),
}

impl FieldUpdate {
    /// Decode a JSON value for `field`, rejecting values of the wrong type.
    pub fn parse(field: ComputeNodeField, value: Value) -> Result<Self, FieldError> {
        use ComputeNodeField as F;
        let update = match field {
            F::Host => Self::Host(decode(field, value)?),
            F::HypervisorHostname => Self::HypervisorHostname(decode(field, value)?),
            F::HostIp => Self::HostIp(decode(field, value)?),
            F::HypervisorType => Self::HypervisorType(decode(field, value)?),
            F::HypervisorVersion => Self::HypervisorVersion(decode(field, value)?),
            F::CpuInfo => Self::CpuInfo(decode(field, value)?),
            F::Vcpus => Self::Vcpus(decode(field, value)?),
            F::VcpusUsed => Self::VcpusUsed(decode(field, value)?),
            F::MemoryMb => Self::MemoryMb(decode(field, value)?),
            F::MemoryMbUsed => Self::MemoryMbUsed(decode(field, value)?),
            F::FreeRamMb => Self::FreeRamMb(decode(field, value)?),
            F::LocalGb => Self::LocalGb(decode(field, value)?),
            F::LocalGbUsed => Self::LocalGbUsed(decode(field, value)?),
            F::FreeDiskGb => Self::FreeDiskGb(decode(field, value)?),
            F::DiskAvailableLeast => Self::DiskAvailableLeast(decode(field, value)?),
            F::CurrentWorkload => Self::CurrentWorkload(decode(field, value)?),
            F::RunningVms => Self::RunningVms(decode(field, value)?),
            F::Stats => Self::Stats(decode(field, value)?),
        };
        Ok(update)
    }

    /// Parse a `(name, value)` pair from an untyped payload.
    pub fn from_pair(name: &str, value: Value) -> Result<Self, FieldError> {
        let field: ComputeNodeField = name.parse()?;
        Self::parse(field, value)
    }

    pub fn field(&self) -> ComputeNodeField {
        use ComputeNodeField as F;
        match self {
            Self::Host(_) => F::Host,
            Self::HypervisorHostname(_) => F::HypervisorHostname,
            Self::HostIp(_) => F::HostIp,
            Self::HypervisorType(_) => F::HypervisorType,
            Self::HypervisorVersion(_) => F::HypervisorVersion,
            Self::CpuInfo(_) => F::CpuInfo,
            Self::Vcpus(_) => F::Vcpus,
            Self::VcpusUsed(_) => F::VcpusUsed,
            Self::MemoryMb(_) => F::MemoryMb,
            Self::MemoryMbUsed(_) => F::MemoryMbUsed,
            Self::FreeRamMb(_) => F::FreeRamMb,
            Self::LocalGb(_) => F::LocalGb,
            Self::LocalGbUsed(_) => F::LocalGbUsed,
            Self::FreeDiskGb(_) => F::FreeDiskGb,
            Self::DiskAvailableLeast(_) => F::DiskAvailableLeast,
            Self::CurrentWorkload(_) => F::CurrentWorkload,
            Self::RunningVms(_) => F::RunningVms,
            Self::Stats(_) => F::Stats,
        }
    }
}

fn decode<T: DeserializeOwned>(field: ComputeNodeField, value: Value) -> Result<T, FieldError> {
    serde_json::from_value(value).map_err(|e| FieldError::InvalidValue {
        field: field.to_string(),
        reason: e.to_string(),
    })
}
