use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::time::sleep;

use raftlet::{Cluster, ClusterConfig, NodeId};

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

#[derive(Parser)]
#[command(name = "raftlet")]
#[command(about = "Raft leader election running as an in-process cluster")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Elect a leader, stop it, and watch the remaining nodes elect a new one
    Demo {
        /// Cluster configuration file (JSON). Defaults to three nodes.
        #[arg(short, long)]
        config: Option<String>,

        /// Override the number of nodes (ids 0..N)
        #[arg(short, long)]
        nodes: Option<usize>,

        /// How long to observe the cluster after each step, in milliseconds
        #[arg(long, default_value_t = 1000)]
        observe_ms: u64,

        /// Seed for election timeouts, for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Print node status as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write a default cluster configuration file
    InitConfig {
        /// Output file path
        #[arg(short, long)]
        output: String,

        /// Number of nodes (ids 0..N)
        #[arg(short, long, default_value_t = 3)]
        nodes: usize,
    },
}

fn print_status(title: &str, cluster: &Cluster, json: bool) -> anyhow::Result<()> {
    println!("\n--- {title} ---");
    if json {
        println!("{}", serde_json::to_string_pretty(&cluster.status())?);
        return Ok(());
    }

    for status in cluster.status() {
        let stopped = if status.stopped { " [stopped]" } else { "" };
        println!(
            "Node-{}: {} (term {}){}",
            status.id, status.role, status.current_term, stopped
        );
    }
    Ok(())
}

async fn run_demo(config: ClusterConfig, observe: Duration, json: bool) -> anyhow::Result<()> {
    let cluster = Cluster::new(&config).context("building cluster")?;
    cluster.start();

    sleep(observe).await;
    print_status("After initial election", &cluster, json)?;

    let Some(leader) = cluster.leader() else {
        warn!("No leader elected within {observe:?}");
        cluster.shutdown().await;
        return Ok(());
    };

    info!(
        "Simulating failure: stopping leader {} (term {})",
        leader.id, leader.current_term
    );
    cluster.stop_node(leader.id)?;

    sleep(observe).await;
    print_status("After leader failure", &cluster, json)?;

    match cluster.leader() {
        Some(next) => println!(
            "\nNode-{} took over at term {} (previous leader Node-{} at term {})",
            next.id, next.current_term, leader.id, leader.current_term
        ),
        None => println!("\nNo new leader: a majority of nodes is unavailable"),
    }

    cluster.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Demo {
            config,
            nodes,
            observe_ms,
            seed,
            json,
        } => {
            let mut cluster_config = match config {
                Some(path) => ClusterConfig::from_file(&path)
                    .with_context(|| format!("loading cluster config from {path}"))?,
                None => ClusterConfig::default(),
            };
            if let Some(count) = nodes {
                cluster_config.nodes = (0..count as NodeId).collect();
            }
            if seed.is_some() {
                cluster_config.seed = seed;
            }

            info!(
                "Starting demo with {} nodes (election timeout {}-{} ms, heartbeat {} ms)",
                cluster_config.nodes.len(),
                cluster_config.election_timeout_min_ms,
                cluster_config.election_timeout_max_ms,
                cluster_config.heartbeat_interval_ms
            );
            run_demo(cluster_config, Duration::from_millis(observe_ms), json).await?;
        }
        Command::InitConfig { output, nodes } => {
            let config = ClusterConfig::with_nodes(nodes);
            config.validate()?;
            config.save(&output)?;
            info!("Wrote cluster config for {nodes} nodes to {output}");
        }
    }

    Ok(())
}
