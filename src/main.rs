use anyhow::{Context, Result};
use chain_kv::config::NodeConfig;
use chain_kv::membership::load_members;
use chain_kv::server::NodeServer;
use clap::Parser;
use std::net::SocketAddrV4;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chain-kv", about = "Replicated key-value storage node")]
struct Cli {
    /// Address to bind and advertise, e.g. 127.0.0.1:5000
    #[arg(long)]
    addr: SocketAddrV4,

    /// File with one `ip:port` member per line
    #[arg(long)]
    members: PathBuf,

    #[arg(long, default_value_t = 1000)]
    gossip_interval_ms: u64,

    /// Push replicas two hops away on SON_DIED / GRANDSON_DIED
    #[arg(long)]
    second_order_repair: bool,

    /// Largest single allocation admitted by the memory budget
    #[arg(long)]
    max_allocation_bytes: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let members = load_members(&cli.members)?;
    if !members.contains(&cli.addr) {
        tracing::warn!(
            "{} is not listed in {}; peers will ignore its HELLO",
            cli.addr,
            cli.members.display()
        );
    }
    tracing::info!("Loaded {} members from {}", members.len(), cli.members.display());

    let config = NodeConfig {
        gossip_interval_ms: cli.gossip_interval_ms,
        second_order_repair: cli.second_order_repair,
        max_allocation_bytes: cli.max_allocation_bytes,
        ..NodeConfig::default()
    };

    let node = NodeServer::bind(cli.addr, members, config)
        .await
        .with_context(|| format!("failed to bind {}", cli.addr))?;

    let signal_node = node.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            signal_node.shutdown();
        }
    });

    node.run().await
}
