//! End-to-end checks of the scheduler client façade against a real
//! in-memory state store and a scripted scheduler transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nimbus_core::{HostIdentity, RequestContext};
use nimbus_scheduler_client::{
    Aggregate, Destination, FilterProperties, RequestSpec, ResourceStats, RpcError, RpcResult,
    SchedulerClient, SchedulerError, SchedulerRpc,
};
use nimbus_state::{NewComputeNode, StateStore};
use serde_json::json;

/// Answers `select_destinations` from a script and counts every call.
#[derive(Default)]
struct ScriptedScheduler {
    script: Mutex<VecDeque<RpcResult<Vec<Destination>>>>,
    select_calls: AtomicUsize,
    aggregate_calls: AtomicUsize,
    aggregate_timeout: bool,
}

impl ScriptedScheduler {
    fn with_script(results: Vec<RpcResult<Vec<Destination>>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            ..Self::default()
        }
    }
}

impl SchedulerRpc for ScriptedScheduler {
    fn select_destinations(
        &self,
        _ctx: &RequestContext,
        _request_spec: &RequestSpec,
        _filter_properties: &FilterProperties,
    ) -> RpcResult<Vec<Destination>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RpcError::remote("select_destinations", "script exhausted")))
    }

    fn update_aggregates(&self, _ctx: &RequestContext, _aggregates: &[Aggregate]) -> RpcResult<()> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        if self.aggregate_timeout {
            return Err(RpcError::timeout("update_aggregates"));
        }
        Ok(())
    }

    fn delete_aggregate(&self, _ctx: &RequestContext, _aggregate: &Aggregate) -> RpcResult<()> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        if self.aggregate_timeout {
            return Err(RpcError::timeout("delete_aggregate"));
        }
        Ok(())
    }
}

fn new_node(host: &str, nodename: &str) -> NewComputeNode {
    NewComputeNode {
        host: host.to_string(),
        hypervisor_hostname: nodename.to_string(),
        hypervisor_type: "kvm".to_string(),
        vcpus: 32,
        memory_mb: 65536,
        local_gb: 1000,
    }
}

fn request() -> (RequestContext, RequestSpec, FilterProperties) {
    (
        RequestContext::new("req-1").with_user("alice", "demo"),
        RequestSpec(json!({"num_instances": 1, "flavor": {"vcpus": 2}})),
        FilterProperties(json!({"retry": {"num_attempts": 1}})),
    )
}

#[test]
fn build_then_report_flow() {
    let rpc = Arc::new(ScriptedScheduler::with_script(vec![
        Err(RpcError::timeout("select_destinations")),
        Ok(vec![Destination::new("compute-1", "compute-1.local")]),
    ]));
    let store = Arc::new(StateStore::open_in_memory().unwrap());
    let node = store
        .create_compute_node(new_node("compute-1", "compute-1.local"))
        .unwrap();
    let client = SchedulerClient::new(rpc.clone(), store.clone());
    let (ctx, spec, props) = request();

    // Placement survives one scheduler hiccup.
    let dests = client.select_destinations(&ctx, &spec, &props).unwrap();
    assert_eq!(dests[0].host, "compute-1");
    assert_eq!(rpc.select_calls.load(Ordering::SeqCst), 2);

    // The chosen host reports its new usage.
    let stats = ResourceStats::new()
        .with("id", node.id)
        .with("vcpus_used", 2)
        .with("memory_mb_used", 4096)
        .with("free_ram_mb", 61440)
        .with("running_vms", 1)
        .with("stats", json!({"num_instances": "1", "num_vm_building": "1"}));
    client
        .update_resource_stats(&ctx, &HostIdentity::new("compute-1", "compute-1.local"), &stats)
        .unwrap();

    let stored = store.get_compute_node(node.id).unwrap();
    assert_eq!(stored.vcpus_used, 2);
    assert_eq!(stored.memory_mb_used, 4096);
    assert_eq!(stored.free_ram_mb, 61440);
    assert_eq!(stored.running_vms, 1);
    assert_eq!(stored.stats["num_vm_building"], json!("1"));
    // Untouched fields keep their registered values.
    assert_eq!(stored.vcpus, 32);
    assert_eq!(stored.local_gb, 1000);
}

#[test]
fn persistent_timeout_reaches_caller_after_two_attempts() {
    let mut script: Vec<RpcResult<Vec<Destination>>> = (0..5)
        .map(|_| Err(RpcError::timeout("select_destinations")))
        .collect();
    script.push(Ok(vec![Destination::new("never", "reached")]));
    let rpc = Arc::new(ScriptedScheduler::with_script(script));
    let store = Arc::new(StateStore::open_in_memory().unwrap());
    let client = SchedulerClient::new(rpc.clone(), store);
    let (ctx, spec, props) = request();

    let err = client.select_destinations(&ctx, &spec, &props).unwrap_err();

    assert!(matches!(err, SchedulerError::Rpc(RpcError::Timeout { .. })));
    assert_eq!(rpc.select_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn aggregate_timeouts_are_not_retried() {
    let rpc = Arc::new(ScriptedScheduler {
        aggregate_timeout: true,
        ..ScriptedScheduler::default()
    });
    let store = Arc::new(StateStore::open_in_memory().unwrap());
    let client = SchedulerClient::new(rpc.clone(), store);
    let ctx = RequestContext::admin();
    let aggregate = Aggregate::new(1, "rack-1");

    assert!(client.update_aggregates(&ctx, &[aggregate.clone()]).unwrap_err().is_timeout());
    assert!(client.delete_aggregate(&ctx, &aggregate).unwrap_err().is_timeout());
    assert_eq!(rpc.aggregate_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn report_for_unregistered_host() {
    let rpc = Arc::new(ScriptedScheduler::default());
    let store = Arc::new(StateStore::open_in_memory().unwrap());
    let client = SchedulerClient::new(rpc, store.clone());
    let ctx = RequestContext::admin();
    let host = HostIdentity::new("fakehost", "fakenode");

    // No id at all: the host was never created.
    let err = client
        .update_resource_stats(&ctx, &host, &ResourceStats::new().with("foo", "bar"))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::ComputeHostNotCreated(_)));

    // An id the store does not know.
    let stats = ResourceStats::new().with("id", 12).with("vcpus_used", 1);
    let err = client.update_resource_stats(&ctx, &host, &stats).unwrap_err();
    assert!(err.is_not_found());
    assert!(store.list_compute_nodes().unwrap().is_empty());
}

#[test]
fn shared_client_across_threads() {
    let rpc = Arc::new(ScriptedScheduler::with_script(
        (0..8)
            .map(|i| Ok(vec![Destination::new(format!("host-{i}"), "node")]))
            .collect(),
    ));
    let store = Arc::new(StateStore::open_in_memory().unwrap());
    let node = store.create_compute_node(new_node("h", "n")).unwrap();
    let client = Arc::new(SchedulerClient::new(rpc.clone(), store.clone()));

    std::thread::scope(|s| {
        for i in 0..8u32 {
            let client = client.clone();
            s.spawn(move || {
                let (ctx, spec, props) = request();
                client.select_destinations(&ctx, &spec, &props).unwrap();
                let stats = ResourceStats::new().with("id", node.id).with("current_workload", i);
                client
                    .update_resource_stats(&ctx, &HostIdentity::new("h", "n"), &stats)
                    .unwrap();
            });
        }
    });

    assert_eq!(rpc.select_calls.load(Ordering::SeqCst), 8);
    assert!(client.query_client().is_initialized());
    assert!(client.report_client().is_initialized());
    assert!(store.get_compute_node(node.id).unwrap().current_workload < 8);
}
