//! Configuration for the clustermgr controller

use crate::common::{Error, Result};
use crate::controller::NodeDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix (`CLUSTERMGR_BIND_ADDR`, ...)
pub const ENV_PREFIX: &str = "CLUSTERMGR";

/// Default config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "clustermgr";

/// Role of a cluster member
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Coordinator,
    Worker,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Coordinator => "coordinator",
            NodeRole::Worker => "worker",
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coordinator" => Ok(NodeRole::Coordinator),
            "worker" => Ok(NodeRole::Worker),
            other => Err(Error::InvalidConfig(format!("unknown node role: {}", other))),
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Per-node call timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// TCP connect timeout for node calls
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Maximum number of node calls in flight for one dispatch
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Maximum accepted request body size
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Static node directory
    #[serde(default)]
    pub nodes: Vec<NodeDescriptor>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
fn default_request_timeout() -> u64 {
    10_000
}
fn default_connect_timeout() -> u64 {
    2_000
}
fn default_max_in_flight() -> usize {
    16
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_timeout_ms: default_request_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            max_in_flight: default_max_in_flight(),
            max_body_bytes: default_max_body_bytes(),
            nodes: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a TOML file (optional) and the environment.
    ///
    /// Without an explicit path, `clustermgr.toml` in the working directory is
    /// used if present. Environment variables override file values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Check the final (merged) configuration before serving
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::InvalidConfig("no nodes configured".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("request_timeout_ms must be > 0".into()));
        }
        if self.max_in_flight == 0 {
            return Err(Error::InvalidConfig("max_in_flight must be > 0".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(Error::InvalidConfig("max_body_bytes must be > 0".into()));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(Error::InvalidConfig("node id must not be empty".into()));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(Error::DuplicateNode(node.id.clone()));
            }
            if !(node.address.starts_with("http://") || node.address.starts_with("https://")) {
                return Err(Error::InvalidConfig(format!(
                    "node {} address must be an http(s) URL: {}",
                    node.id, node.address
                )));
            }
        }

        Ok(())
    }
}

/// Parse a `--node` flag of the form `id=role@address`
pub fn parse_node_flag(s: &str) -> Result<NodeDescriptor> {
    let (id, rest) = s
        .split_once('=')
        .ok_or_else(|| Error::InvalidConfig(format!("expected id=role@address, got {}", s)))?;
    let (role, address) = rest
        .split_once('@')
        .ok_or_else(|| Error::InvalidConfig(format!("expected id=role@address, got {}", s)))?;

    Ok(NodeDescriptor::new(id.trim(), address.trim(), role.parse()?))
}
