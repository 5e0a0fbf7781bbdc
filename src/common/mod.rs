//! Common utilities and types shared across clustermgr

pub mod config;
pub mod error;
pub mod tracing_middleware;
pub mod utils;

pub use config::{parse_node_flag, ControllerConfig, NodeRole};
pub use error::{Error, Result};
pub use utils::{decode_segment, encode_query, encode_segment, QueryParams};
