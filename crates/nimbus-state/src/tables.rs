//! redb table definitions for the Nimbus state store.

use redb::TableDefinition;

/// Compute node records keyed by numeric id, JSON-serialized.
pub const COMPUTE_NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("compute_nodes");

/// Store bookkeeping counters keyed by name.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Key in `SEQUENCES` holding the last id handed out to a compute node.
pub const COMPUTE_NODE_SEQ: &str = "compute_nodes";
