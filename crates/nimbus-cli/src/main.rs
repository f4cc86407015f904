use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nimbus_core::NimbusConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "nimbus-manage",
    about = "Nimbus — compute node records and scheduler reporting",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to nimbus.toml (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage compute node records
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum NodeAction {
    /// Register a compute node
    Create {
        #[arg(long)]
        host: String,
        #[arg(long)]
        nodename: String,
        #[arg(long, default_value = "0")]
        vcpus: u32,
        #[arg(long, default_value = "0")]
        memory_mb: u64,
        #[arg(long, default_value = "0")]
        local_gb: u64,
        #[arg(long, default_value = "kvm")]
        hypervisor_type: String,
    },
    /// List compute nodes
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Show one compute node as JSON
    Show { id: u64 },
    /// Apply a resource stats report, e.g. '{"id": 1, "vcpus_used": 4}'
    UpdateStats {
        #[arg(long)]
        host: String,
        #[arg(long)]
        nodename: String,
        #[arg(long)]
        stats: String,
    },
    /// Delete a compute node
    Delete { id: u64 },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => NimbusConfig::from_file(path)?,
        None => NimbusConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.log.filter))?,
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Node { action } => {
            let store = commands::node::open_store(&config)?;
            match action {
                NodeAction::Create {
                    host,
                    nodename,
                    vcpus,
                    memory_mb,
                    local_gb,
                    hypervisor_type,
                } => commands::node::create(
                    &store,
                    nimbus_state::NewComputeNode {
                        host,
                        hypervisor_hostname: nodename,
                        hypervisor_type,
                        vcpus,
                        memory_mb,
                        local_gb,
                    },
                ),
                NodeAction::List { format } => commands::node::list(&store, &format),
                NodeAction::Show { id } => commands::node::show(&store, id),
                NodeAction::UpdateStats {
                    host,
                    nodename,
                    stats,
                } => commands::node::update_stats(store, &host, &nodename, &stats),
                NodeAction::Delete { id } => commands::node::delete(&store, id),
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&config),
        },
    }
}
