use std::sync::Arc;

use nimbus_core::{HostIdentity, NimbusConfig, RequestContext};
use nimbus_scheduler_client::{ReportClient, ResourceStats};
use nimbus_state::{ComputeNode, NewComputeNode, StateStore};
use tracing::info;

pub fn open_store(config: &NimbusConfig) -> anyhow::Result<StateStore> {
    if let Some(parent) = config.state.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(StateStore::open(&config.state.path)?)
}

pub fn create(store: &StateStore, new: NewComputeNode) -> anyhow::Result<()> {
    let node = store.create_compute_node(new)?;
    println!("✓ Created compute node {} ({}/{})", node.id, node.host, node.hypervisor_hostname);
    Ok(())
}

pub fn list(store: &StateStore, format: &str) -> anyhow::Result<()> {
    let nodes = store.list_compute_nodes()?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&nodes)?),
        _ => print!("{}", format_table(&nodes)),
    }
    Ok(())
}

pub fn show(store: &StateStore, id: u64) -> anyhow::Result<()> {
    let node = store.get_compute_node(id)?;
    println!("{}", serde_json::to_string_pretty(&node)?);
    Ok(())
}

/// Push a stats report through the scheduler report client.
pub fn update_stats(
    store: StateStore,
    host: &str,
    nodename: &str,
    stats: &str,
) -> anyhow::Result<()> {
    let stats = parse_stats(stats)?;
    let client = ReportClient::new(Arc::new(store));
    let host = HostIdentity::new(host, nodename);
    client.update_resource_stats(&RequestContext::admin(), &host, &stats)?;
    info!(%host, "stats report applied");
    println!("✓ Updated compute node for {host}");
    Ok(())
}

pub fn delete(store: &StateStore, id: u64) -> anyhow::Result<()> {
    if store.delete_compute_node(id)? {
        println!("✓ Deleted compute node {id}");
    } else {
        anyhow::bail!("compute node {id} not found");
    }
    Ok(())
}

fn parse_stats(raw: &str) -> anyhow::Result<ResourceStats> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    Ok(ResourceStats::try_from(value)?)
}

fn format_table(nodes: &[ComputeNode]) -> String {
    let mut out = format!(
        "{:<6} {:<20} {:<24} {:>11} {:>15} {:>11}\n",
        "ID", "HOST", "NODENAME", "VCPUS", "MEMORY_MB", "RUNNING_VMS"
    );
    for n in nodes {
        out.push_str(&format!(
            "{:<6} {:<20} {:<24} {:>11} {:>15} {:>11}\n",
            n.id,
            n.host,
            n.hypervisor_hostname,
            format!("{}/{}", n.vcpus_used, n.vcpus),
            format!("{}/{}", n.memory_mb_used, n.memory_mb),
            n.running_vms,
        ));
    }
    out
}
