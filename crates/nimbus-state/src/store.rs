//! StateStore — redb-backed persistence for compute node records.
//!
//! Values are JSON-serialized into redb's `&[u8]` value column, keyed by
//! the record's numeric id. Ids come from a monotonic sequence and are never
//! reused. The store supports both on-disk and in-memory backends (the
//! latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use nimbus_core::RequestContext;
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Fetch/save access to compute node records.
///
/// This is the seam the report client depends on; `StateStore` is the
/// production implementation.
pub trait ComputeNodeStore: Send + Sync {
    /// Load a record by id. Fails with `StateError::NotFound` when absent.
    fn fetch(&self, ctx: &RequestContext, id: ComputeNodeId) -> StateResult<ComputeNode>;

    /// Persist the record's pending changes.
    fn save(&self, ctx: &RequestContext, node: &mut ComputeNode) -> StateResult<()>;
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(COMPUTE_NODES).map_err(map_err!(Table))?;
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Register a new compute node and return the stored record.
    pub fn create_compute_node(&self, new: NewComputeNode) -> StateResult<ComputeNode> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let node;
        {
            let mut seq = txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
            let last = seq
                .get(COMPUTE_NODE_SEQ)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(0);
            let id = last + 1;
            seq.insert(COMPUTE_NODE_SEQ, id).map_err(map_err!(Write))?;

            node = new.into_record(id, epoch_secs());
            let value = serde_json::to_vec(&node).map_err(map_err!(Serialize))?;
            let mut table = txn.open_table(COMPUTE_NODES).map_err(map_err!(Table))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            id = node.id,
            host = %node.host,
            nodename = %node.hypervisor_hostname,
            "compute node created"
        );
        Ok(node)
    }

    /// Get a compute node by id.
    pub fn get_compute_node(&self, id: ComputeNodeId) -> StateResult<ComputeNode> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(COMPUTE_NODES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))
            }
            None => Err(not_found(id)),
        }
    }

    /// Find the compute node a service host reports under `nodename`.
    pub fn get_compute_node_by_host_and_nodename(
        &self,
        host: &str,
        nodename: &str,
    ) -> StateResult<ComputeNode> {
        self.list_compute_nodes()?
            .into_iter()
            .find(|n| n.host == host && n.hypervisor_hostname == nodename)
            .ok_or_else(|| StateError::NotFound(format!("compute node {host}/{nodename}")))
    }

    /// List all compute nodes in id order.
    pub fn list_compute_nodes(&self) -> StateResult<Vec<ComputeNode>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(COMPUTE_NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let node: ComputeNode =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(node);
        }
        Ok(results)
    }

    /// Write the record's changed fields over the stored copy.
    ///
    /// Only fields reported by `changed_fields` are written, so concurrent
    /// updates to other fields are preserved. On success `node` is refreshed
    /// from the stored copy and its change set is cleared. A record without
    /// changes is left untouched.
    pub fn save_compute_node(&self, node: &mut ComputeNode) -> StateResult<()> {
        if !node.has_changes() {
            debug!(id = node.id, "compute node unchanged, skipping save");
            return Ok(());
        }

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored;
        {
            let mut table = txn.open_table(COMPUTE_NODES).map_err(map_err!(Table))?;
            let bytes = table
                .get(node.id)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value().to_vec())
                .ok_or_else(|| not_found(node.id))?;
            let mut current: ComputeNode =
                serde_json::from_slice(&bytes).map_err(map_err!(Deserialize))?;

            for field in node.changed_fields() {
                current.apply(node.value_of(field));
            }
            current.updated_at = epoch_secs();
            current.reset_changes();

            let value = serde_json::to_vec(&current).map_err(map_err!(Serialize))?;
            table
                .insert(node.id, value.as_slice())
                .map_err(map_err!(Write))?;
            stored = current;
        }
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(
            id = node.id,
            fields = ?node.changed_fields().map(|f| f.as_str()).collect::<Vec<_>>(),
            "compute node saved"
        );
        *node = stored;
        Ok(())
    }

    /// Delete a compute node by id. Returns true if it existed.
    pub fn delete_compute_node(&self, id: ComputeNodeId) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(COMPUTE_NODES).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, existed, "compute node deleted");
        Ok(existed)
    }
}

impl ComputeNodeStore for StateStore {
    fn fetch(&self, ctx: &RequestContext, id: ComputeNodeId) -> StateResult<ComputeNode> {
        debug!(request_id = %ctx.request_id, id, "fetching compute node");
        self.get_compute_node(id)
    }

    fn save(&self, ctx: &RequestContext, node: &mut ComputeNode) -> StateResult<()> {
        debug!(request_id = %ctx.request_id, id = node.id, "saving compute node");
        self.save_compute_node(node)
    }
}

fn not_found(id: ComputeNodeId) -> StateError {
    StateError::NotFound(format!("compute node {id}"))
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
