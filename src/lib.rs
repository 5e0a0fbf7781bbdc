//! # clustermgr
//!
//! A management controller that fans one operator call out to many cluster
//! nodes and merges their answers:
//! - Scope (`all`, `coordinator`, `worker`) and explicit `nodeId` targeting
//! - One immutable request template per call, shared by every node
//! - Bounded-concurrency dispatch with a per-node timeout
//! - Single-node passthrough, `207 Multi-Status` for many nodes
//!
//! ## Architecture
//!
//! ```text
//!        operator / clustermgr CLI
//!                   │ HTTP
//! ┌─────────────────▼───────────────────────┐
//! │              Controller                 │
//! │  route table → template → scope resolve │
//! │  dispatcher (bounded fan-out)           │
//! │  aggregator (passthrough / 207)         │
//! └───────────┬─────────────────────────────┘
//!             │ HTTP (one call per target)
//!   ┌─────────┴──────────┬──────────────┐
//!   │                    │              │
//! ┌─▼───────────┐   ┌────▼───────┐   ┌──▼─────────┐
//! │ coordinator │   │ worker w1  │   │ worker w2  │
//! │ agent API   │   │ agent API  │   │ agent API  │
//! └─────────────┘   └────────────┘   └────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start the controller
//! ```bash
//! clustermgr-controller serve \
//!   --bind 0.0.0.0:8080 \
//!   --node c1=coordinator@http://10.0.0.1:8081 \
//!   --node w1=worker@http://10.0.0.2:8081 \
//!   --node w2=worker@http://10.0.0.3:8081
//! ```
//!
//! ### Use the CLI
//! ```bash
//! # Read a property on every worker
//! clustermgr --scope worker connectors get-property tpch.properties connector.name
//!
//! # Set a property on one node
//! clustermgr --node-id w1 connectors set-property tpch.properties tpch.splits 4
//!
//! # Last 20 warnings from every node
//! clustermgr logs get server.log --level WARN -n 20
//! ```

pub mod client;
pub mod common;
pub mod controller;

// Re-export commonly used types
pub use common::{ControllerConfig, Error, Result};
pub use controller::{Controller, ControllerServer};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
