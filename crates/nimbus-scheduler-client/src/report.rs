//! Report side of the scheduler client.
//!
//! Compute hosts periodically report resource usage as an untyped stats
//! payload. `ReportClient` validates the payload against the compute node
//! schema, then fetches, patches and saves the matching record.

use std::sync::Arc;

use nimbus_core::{HostIdentity, RequestContext};
use nimbus_state::{ComputeNodeId, ComputeNodeStore, FieldError, FieldUpdate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{SchedulerError, SchedulerResult};

/// Key in a stats payload naming the compute node record.
pub const STATS_ID_KEY: &str = "id";

/// Resource stats as reported by a compute host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceStats(Map<String, Value>);

impl ResourceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ResourceStats {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ResourceStats {
    type Error = FieldError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(FieldError::InvalidValue {
                field: "stats".to_string(),
                reason: format!("expected a JSON object, got {other}"),
            }),
        }
    }
}

/// A stats payload checked against the compute node schema.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsPatch {
    pub id: ComputeNodeId,
    pub updates: Vec<FieldUpdate>,
}

impl StatsPatch {
    /// Validate `stats` reported for `host`.
    ///
    /// A payload without `id` is `ComputeHostNotCreated`; unknown, read-only
    /// or mistyped fields are `InvalidStats`.
    pub fn parse(host: &HostIdentity, stats: &ResourceStats) -> SchedulerResult<Self> {
        let raw_id = stats
            .get(STATS_ID_KEY)
            .ok_or_else(|| SchedulerError::ComputeHostNotCreated(host.to_string()))?;
        let id = raw_id.as_u64().ok_or_else(|| FieldError::InvalidValue {
            field: STATS_ID_KEY.to_string(),
            reason: format!("expected a non-negative integer, got {raw_id}"),
        })?;

        let updates = stats
            .0
            .iter()
            .filter(|(key, _)| key.as_str() != STATS_ID_KEY)
            .map(|(key, value)| FieldUpdate::from_pair(key, value.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { id, updates })
    }
}

/// Applies host resource reports to compute node records.
pub struct ReportClient {
    store: Arc<dyn ComputeNodeStore>,
}

impl ReportClient {
    pub fn new(store: Arc<dyn ComputeNodeStore>) -> Self {
        Self { store }
    }

    /// Update the compute node record named by `stats["id"]`.
    ///
    /// Nothing is read from the store unless the payload validates. The
    /// record's pending changes are discarded before the new values are
    /// applied, so the save persists exactly this report.
    pub fn update_resource_stats(
        &self,
        ctx: &RequestContext,
        host: &HostIdentity,
        stats: &ResourceStats,
    ) -> SchedulerResult<()> {
        let patch = StatsPatch::parse(host, stats)?;

        let mut node = self.store.fetch(ctx, patch.id)?;
        node.reset_changes();
        let fields = patch.updates.len();
        for update in patch.updates {
            node.apply(update);
        }
        self.store.save(ctx, &mut node)?;

        info!(
            request_id = %ctx.request_id,
            %host,
            id = patch.id,
            fields,
            "resource stats updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_state::{ComputeNode, StateError, StateResult};
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store double with one optional record and call counters.
    #[derive(Default)]
    struct MockStore {
        node: Mutex<Option<ComputeNode>>,
        fetches: AtomicUsize,
        saved: Mutex<Vec<(ComputeNode, Vec<nimbus_state::ComputeNodeField>)>>,
    }

    impl MockStore {
        fn with_node(node: ComputeNode) -> Self {
            Self {
                node: Mutex::new(Some(node)),
                ..Self::default()
            }
        }
    }

    impl ComputeNodeStore for MockStore {
        fn fetch(&self, _ctx: &RequestContext, id: ComputeNodeId) -> StateResult<ComputeNode> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.node
                .lock()
                .unwrap()
                .clone()
                .filter(|n| n.id == id)
                .ok_or_else(|| StateError::NotFound(format!("compute node {id}")))
        }

        fn save(&self, _ctx: &RequestContext, node: &mut ComputeNode) -> StateResult<()> {
            let changed = node.changed_fields().collect();
            self.saved.lock().unwrap().push((node.clone(), changed));
            Ok(())
        }
    }

    fn stored_node() -> ComputeNode {
        // Carries a stale modification that must not leak into the save.
        let mut node = ComputeNode::new(1, "fakehost", "fakenode");
        node.apply(FieldUpdate::CurrentWorkload(99));
        node
    }

    fn host() -> HostIdentity {
        HostIdentity::new("fakehost", "fakenode")
    }

    #[test]
    fn update_applies_fields_and_saves_once() {
        let store = Arc::new(MockStore::with_node(stored_node()));
        let client = ReportClient::new(store.clone());
        let stats = ResourceStats::new()
            .with("id", 1)
            .with("vcpus_used", 4)
            .with("stats", json!({"num_instances": "2"}));

        client
            .update_resource_stats(&RequestContext::admin(), &host(), &stats)
            .unwrap();

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        let (node, changed) = &saved[0];
        assert_eq!(node.vcpus_used, 4);
        assert_eq!(node.stats["num_instances"], json!("2"));
        assert_eq!(
            changed,
            &vec![
                nimbus_state::ComputeNodeField::VcpusUsed,
                nimbus_state::ComputeNodeField::Stats,
            ]
        );
    }

    #[test]
    fn missing_id_fails_before_lookup() {
        let store = Arc::new(MockStore::with_node(stored_node()));
        let client = ReportClient::new(store.clone());
        let stats = ResourceStats::new().with("vcpus_used", 4);

        let err = client
            .update_resource_stats(&RequestContext::admin(), &host(), &stats)
            .unwrap_err();

        assert!(matches!(
            err,
            SchedulerError::ComputeHostNotCreated(ref h) if h == "fakehost/fakenode"
        ));
        assert_eq!(
            err.to_string(),
            "compute host fakehost/fakenode needs to be created first before updating"
        );
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_payload_is_not_identifiable() {
        let store = Arc::new(MockStore::default());
        let client = ReportClient::new(store.clone());

        let err = client
            .update_resource_stats(&RequestContext::admin(), &host(), &ResourceStats::new())
            .unwrap_err();

        assert!(matches!(err, SchedulerError::ComputeHostNotCreated(_)));
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_record_propagates_not_found() {
        let store = Arc::new(MockStore::with_node(stored_node()));
        let client = ReportClient::new(store.clone());
        let stats = ResourceStats::new().with("id", 2).with("vcpus_used", 1);

        let err = client
            .update_resource_stats(&RequestContext::admin(), &host(), &stats)
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_field_rejected_before_lookup() {
        let store = Arc::new(MockStore::with_node(stored_node()));
        let client = ReportClient::new(store.clone());
        let stats = ResourceStats::new().with("id", 1).with("foo", "bar");

        let err = client
            .update_resource_stats(&RequestContext::admin(), &host(), &stats)
            .unwrap_err();

        assert!(matches!(
            err,
            SchedulerError::InvalidStats(FieldError::Unknown(ref f)) if f == "foo"
        ));
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn mistyped_value_rejected_before_lookup() {
        let store = Arc::new(MockStore::with_node(stored_node()));
        let client = ReportClient::new(store.clone());
        let stats = ResourceStats::new().with("id", 1).with("memory_mb_used", "lots");

        let err = client
            .update_resource_stats(&RequestContext::admin(), &host(), &stats)
            .unwrap_err();

        assert!(matches!(err, SchedulerError::InvalidStats(FieldError::InvalidValue { .. })));
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn read_only_fields_rejected() {
        let stats = ResourceStats::new().with("id", 1).with("created_at", 5);
        let err = StatsPatch::parse(&host(), &stats).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidStats(FieldError::ReadOnly(_))));
    }

    #[test]
    fn non_integer_id_rejected() {
        for bad in [json!("1"), json!(-1), json!(1.5), Value::Null] {
            let stats = ResourceStats::new().with("id", bad);
            let err = StatsPatch::parse(&host(), &stats).unwrap_err();
            assert!(matches!(err, SchedulerError::InvalidStats(_)));
        }
    }

    #[test]
    fn id_only_payload_saves_without_changes() {
        let store = Arc::new(MockStore::with_node(stored_node()));
        let client = ReportClient::new(store.clone());

        let stats = ResourceStats::new().with("id", 1);
        client
            .update_resource_stats(&RequestContext::admin(), &host(), &stats)
            .unwrap();

        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].1.is_empty());
    }

    #[test]
    fn patch_excludes_id() {
        let stats = ResourceStats::new().with("id", 7).with("running_vms", 2);
        let patch = StatsPatch::parse(&host(), &stats).unwrap();
        assert_eq!(
            patch,
            StatsPatch {
                id: 7,
                updates: vec![FieldUpdate::RunningVms(2)],
            }
        );
    }

    #[test]
    fn stats_from_json_value() {
        let stats = ResourceStats::try_from(json!({"id": 1, "vcpus": 8})).unwrap();
        assert_eq!(stats.len(), 2);
        assert!(ResourceStats::try_from(json!([1])).is_err());
    }
}
