// src/lib.rs

pub mod cli;
pub mod config;
pub mod diag;
pub mod errors;
pub mod logging;
pub mod policy;
pub mod session;
pub mod task;
pub mod topology;
pub mod transport;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{GridConfig, load_and_validate};
use crate::diag::{NodeInfo, NodeInfoArg, NodeInfoTask};
use crate::session::{Coordinator, SessionOptions};
use crate::task::SingleNode;
use crate::topology::{NodeId, StaticTopology, TopologyProvider, TopologySnapshot};
use crate::transport::LocalTransport;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the in-process transport over the configured topology
/// - a single-target node info task
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let provider = StaticTopology::from_config(&cfg);
    let topology = provider.snapshot();

    if args.dry_run {
        print_dry_run(&cfg, &topology);
        return Ok(());
    }

    let target = match args.node {
        Some(id) => NodeId::new(id),
        None => topology
            .iter()
            .next()
            .map(|node| node.id().clone())
            .ok_or_else(|| anyhow!("topology has no nodes"))?,
    };

    let transport = LocalTransport::new(&topology);
    let coordinator = Coordinator::new(SingleNode::new(NodeInfoTask), transport)
        .with_options(SessionOptions::from(&cfg.engine));

    let handle = coordinator.submit(&NodeInfoArg::new(target.clone()), Arc::clone(&topology))?;
    info!(session = %handle.session(), node = %target, "node info task submitted");

    // Ctrl-C stops waiting; the session itself finishes in the background.
    let (cancel_tx, cancel_rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        let _ = cancel_tx.send(());
    });

    let info = handle.join_with_cancel(cancel_rx).await?;
    print_node_info(&info);
    Ok(())
}

/// Dry-run output: print engine settings and the topology.
fn print_dry_run(cfg: &GridConfig, topology: &TopologySnapshot) {
    println!("gridtask dry-run");
    println!(
        "  engine.failover_attempts = {}",
        cfg.engine.failover_attempts
    );
    println!();

    println!("nodes ({}):", topology.len());
    for node in topology.iter() {
        println!("  - {} ({})", node.id(), node.role());
        for (key, value) in node.attributes() {
            println!("      {key} = {value}");
        }
    }

    debug!("dry-run complete (nothing dispatched)");
}

fn print_node_info(info: &NodeInfo) {
    println!("node {}", info.id);
    println!("  role: {}", info.role);
    for (key, value) in &info.attributes {
        println!("  {key}: {value}");
    }
}
