//! Fan-out dispatcher
//!
//! Sends one [`RequestTemplate`] to every target node with bounded
//! concurrency and a per-call timeout, and returns exactly one
//! [`NodeResult`] per target. A node that fails, hangs or refuses the
//! connection only affects its own result.

use crate::common::{Error, Result};
use crate::controller::registry::NodeDescriptor;
use crate::controller::template::RequestTemplate;
use crate::controller::transport::{NodeResponse, NodeTransport, TransportError};
use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Why a node call did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeFailure {
    Timeout(String),
    ConnectionRefused(String),
    /// The node answered with a non-2xx status; the response is kept verbatim
    NonSuccessStatus(NodeResponse),
    Transport(String),
}

impl NodeFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeFailure::Timeout(_) => "timeout",
            NodeFailure::ConnectionRefused(_) => "connection_refused",
            NodeFailure::NonSuccessStatus(_) => "non_success_status",
            NodeFailure::Transport(_) => "transport",
        }
    }

    pub fn message(&self) -> String {
        match self {
            NodeFailure::Timeout(m)
            | NodeFailure::ConnectionRefused(m)
            | NodeFailure::Transport(m) => m.clone(),
            NodeFailure::NonSuccessStatus(resp) => format!(
                "status {}: {}",
                resp.status,
                String::from_utf8_lossy(&resp.body)
            ),
        }
    }
}

impl From<TransportError> for NodeFailure {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout(m) => NodeFailure::Timeout(m),
            TransportError::ConnectionRefused(m) => NodeFailure::ConnectionRefused(m),
            TransportError::Other(m) => NodeFailure::Transport(m),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    Success(NodeResponse),
    Failure(NodeFailure),
}

/// Outcome of the call on one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeResult {
    pub node_id: String,
    pub outcome: NodeOutcome,
}

impl NodeResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, NodeOutcome::Success(_))
    }
}

/// Executes templates against node sets
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn NodeTransport>,
    timeout: Duration,
    max_in_flight: usize,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("timeout", &self.timeout)
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn NodeTransport>, timeout: Duration, max_in_flight: usize) -> Self {
        Self {
            transport,
            timeout,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Call every target and collect one result per node, ordered by node ID
    pub async fn dispatch(
        &self,
        template: &RequestTemplate,
        targets: &[NodeDescriptor],
    ) -> Result<Vec<NodeResult>> {
        if targets.is_empty() {
            return Err(Error::NoTargetNodes);
        }

        tracing::debug!(
            method = %template.method(),
            path = %template.path(),
            targets = targets.len(),
            "Dispatching to nodes"
        );

        let calls: Vec<_> = targets.iter().map(|node| self.call(node, template)).collect();
        let mut results: Vec<NodeResult> = stream::iter(calls)
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        results.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        let failed = results.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            tracing::warn!(
                "{} of {} nodes failed for {} {}",
                failed,
                results.len(),
                template.method(),
                template.path()
            );
        }

        Ok(results)
    }

    /// Like [`dispatch`](Self::dispatch), but gives up as soon as `cancel`
    /// completes. Outstanding calls are dropped and nothing is returned for
    /// the nodes that did answer.
    pub async fn dispatch_until<F>(
        &self,
        template: &RequestTemplate,
        targets: &[NodeDescriptor],
        cancel: F,
    ) -> Result<Vec<NodeResult>>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            results = self.dispatch(template, targets).boxed() => results,
            _ = cancel => {
                tracing::warn!("Dispatch of {} {} cancelled", template.method(), template.path());
                Err(Error::Cancelled)
            }
        }
    }

    async fn call(&self, node: &NodeDescriptor, template: &RequestTemplate) -> NodeResult {
        let outcome = match tokio::time::timeout(self.timeout, self.transport.execute(node, template))
            .await
        {
            Err(_) => NodeOutcome::Failure(NodeFailure::Timeout(format!(
                "no response from {} within {}ms",
                node.id,
                self.timeout.as_millis()
            ))),
            Ok(Err(e)) => NodeOutcome::Failure(e.into()),
            Ok(Ok(resp)) if (200..300).contains(&resp.status) => NodeOutcome::Success(resp),
            Ok(Ok(resp)) => NodeOutcome::Failure(NodeFailure::NonSuccessStatus(resp)),
        };

        match &outcome {
            NodeOutcome::Success(resp) => {
                tracing::debug!(node = %node.id, status = resp.status, "Node call succeeded")
            }
            NodeOutcome::Failure(f) => {
                tracing::warn!(node = %node.id, kind = f.kind(), "Node call failed: {}", f.message())
            }
        }

        NodeResult {
            node_id: node.id.clone(),
            outcome,
        }
    }
}
