//! CLI for cluster management calls

use clap::{Parser, Subcommand};
use clustermgr::client::{ManagementClient, Target};
use reqwest::Method;

#[derive(Parser)]
#[command(name = "clustermgr")]
#[command(about = "Manage connector files and logs across a cluster")]
#[command(version)]
struct Cli {
    /// Controller URL
    #[arg(long, default_value = "http://localhost:8080", env = "CLUSTERMGR_CONTROLLER")]
    controller: String,

    /// Scope: all, coordinator or worker
    #[arg(long, global = true)]
    scope: Option<String>,

    /// Explicit node ID (repeatable)
    #[arg(long = "node-id", global = true)]
    node_ids: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connector file operations
    Connectors {
        #[command(subcommand)]
        command: ConnectorCommands,
    },

    /// Log operations
    Logs {
        #[command(subcommand)]
        command: LogCommands,
    },

    /// Show the controller's node directory
    Nodes,
}

#[derive(Subcommand)]
enum ConnectorCommands {
    /// List connector file names
    List,

    /// Print a connector file
    Get { file: String },

    /// Print one property of a connector file
    GetProperty { file: String, property: String },

    /// Set (or create) a property
    SetProperty {
        file: String,
        property: String,
        value: String,
    },

    /// Replace a connector file with the file at a URL
    SetFromUrl { file: String, url: String },

    /// Delete a connector file
    Delete { file: String },

    /// Delete one property of a connector file
    DeleteProperty { file: String, property: String },
}

#[derive(Subcommand)]
enum LogCommands {
    /// Fetch log entries
    Get {
        file: String,

        /// Ignore entries before this date
        #[arg(long)]
        from: Option<String>,

        /// Ignore entries after this date
        #[arg(long)]
        to: Option<String>,

        /// Only entries of this level
        #[arg(long)]
        level: Option<String>,

        /// Maximum number of entries
        #[arg(short = 'n', long)]
        max_entries: Option<u32>,
    },

    /// Delete log entries up to a date
    Delete {
        file: String,

        #[arg(long)]
        to: Option<String>,
    },
}

fn push_opt(pairs: &mut Vec<(String, String)>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        pairs.push((key.to_string(), v));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = ManagementClient::new(cli.controller);
    let target = Target {
        scope: cli.scope,
        node_ids: cli.node_ids,
    };

    let response = match cli.command {
        Commands::Nodes => client.nodes().await?,
        Commands::Connectors { command } => match command {
            ConnectorCommands::List => {
                client
                    .call(Method::GET, &["connectors"], &target, &[], None)
                    .await?
            }
            ConnectorCommands::Get { file } => {
                client
                    .call(Method::GET, &["connectors", &file], &target, &[], None)
                    .await?
            }
            ConnectorCommands::GetProperty { file, property } => {
                client
                    .call(Method::GET, &["connectors", &file, &property], &target, &[], None)
                    .await?
            }
            ConnectorCommands::SetProperty {
                file,
                property,
                value,
            } => {
                client
                    .call(
                        Method::PUT,
                        &["connectors", &file, &property],
                        &target,
                        &[],
                        Some(value),
                    )
                    .await?
            }
            ConnectorCommands::SetFromUrl { file, url } => {
                client
                    .call(Method::POST, &["connectors", &file], &target, &[], Some(url))
                    .await?
            }
            ConnectorCommands::Delete { file } => {
                client
                    .call(Method::DELETE, &["connectors", &file], &target, &[], None)
                    .await?
            }
            ConnectorCommands::DeleteProperty { file, property } => {
                client
                    .call(Method::DELETE, &["connectors", &file, &property], &target, &[], None)
                    .await?
            }
        },
        Commands::Logs { command } => match command {
            LogCommands::Get {
                file,
                from,
                to,
                level,
                max_entries,
            } => {
                let mut extra = Vec::new();
                push_opt(&mut extra, "from", from);
                push_opt(&mut extra, "to", to);
                push_opt(&mut extra, "level", level);
                push_opt(&mut extra, "n", max_entries.map(|n| n.to_string()));
                client
                    .call(Method::GET, &["logs", &file], &target, &extra, None)
                    .await?
            }
            LogCommands::Delete { file, to } => {
                let mut extra = Vec::new();
                push_opt(&mut extra, "to", to);
                client
                    .call(Method::DELETE, &["logs", &file], &target, &extra, None)
                    .await?
            }
        },
    };

    println!("HTTP {}", response.status);
    if response.is_multi_status() {
        match serde_json::from_str::<serde_json::Value>(&response.body) {
            Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
            Err(_) => println!("{}", response.body),
        }
    } else {
        println!("{}", response.body);
    }

    if response.status >= 400 {
        std::process::exit(1);
    }

    Ok(())
}
