//! Controller: fans one management call out to many nodes
//!
//! The controller is responsible for:
//! - Mapping incoming calls to operations (route table)
//! - Decoding typed query parameters
//! - Resolving `scope` / `nodeId` against the node directory
//! - Building one immutable request template per call
//! - Dispatching it to every target with bounded concurrency
//! - Merging per-node outcomes into one response

pub mod aggregate;
pub mod dispatcher;
pub mod http;
pub mod params;
pub mod registry;
pub mod routes;
pub mod scope;
pub mod server;
pub mod service;
pub mod template;
pub mod transport;

pub use aggregate::{aggregate, AggregateBody, AggregateResponse, NodeEntry};
pub use dispatcher::{Dispatcher, NodeFailure, NodeOutcome, NodeResult};
pub use registry::{NodeDescriptor, NodeRegistry, NodeSnapshot, StaticRegistry};
pub use routes::{Operation, RouteTable};
pub use scope::{resolve, Scope};
pub use server::ControllerServer;
pub use service::{Controller, ControllerRequest};
pub use template::RequestTemplate;
pub use transport::{HttpTransport, NodeResponse, NodeTransport, TransportError};
