//! Controller binary

use clap::{Parser, Subcommand};
use clustermgr::common::{parse_node_flag, ControllerConfig};
use clustermgr::ControllerServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clustermgr-controller")]
#[command(about = "clustermgr controller: fans management calls out to cluster nodes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start controller server
    Serve {
        /// Config file (TOML); defaults to ./clustermgr.toml if present
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Cluster node as id=role@address (repeatable, replaces configured nodes)
        #[arg(long = "node")]
        nodes: Vec<String>,

        /// Per-node call timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Maximum concurrent node calls per request
        #[arg(long)]
        max_in_flight: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            nodes,
            timeout_ms,
            max_in_flight,
        } => {
            // File and environment first, CLI arguments have priority
            let mut controller_config = ControllerConfig::load(config.as_deref())?;

            if let Some(bind) = bind {
                controller_config.bind_addr = bind;
            }
            if !nodes.is_empty() {
                controller_config.nodes = nodes
                    .iter()
                    .map(|n| parse_node_flag(n))
                    .collect::<Result<_, _>>()?;
            }
            if let Some(timeout_ms) = timeout_ms {
                controller_config.request_timeout_ms = timeout_ms;
            }
            if let Some(max_in_flight) = max_in_flight {
                controller_config.max_in_flight = max_in_flight;
            }

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| controller_config.log_level.as_str().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            ControllerServer::new(controller_config).serve().await?;
        }
    }

    Ok(())
}
