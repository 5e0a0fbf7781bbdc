//! Controller request pipeline
//!
//! route lookup -> typed parameters -> scope resolution -> template ->
//! fan-out -> aggregation. Every step before the fan-out may reject the
//! request; once the fan-out starts, failures are reported per node.

use crate::common::tracing_middleware::REQUEST_ID_HEADER;
use crate::common::utils::QueryParams;
use crate::common::Result;
use crate::controller::aggregate::{aggregate, AggregateResponse};
use crate::controller::dispatcher::Dispatcher;
use crate::controller::params::{parse_level, parse_limit, parse_time_bound, parse_time_range, LogQuery};
use crate::controller::registry::{NodeDescriptor, NodeRegistry};
use crate::controller::routes::{Operation, RouteMatch, RouteTable};
use crate::controller::scope::{resolve, Scope, NODE_ID_PARAM, SCOPE_PARAM};
use crate::controller::template::{RequestTemplate, TEXT_PLAIN};
use axum::http::Method;
use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;

/// An incoming management call, independent of the HTTP framework
#[derive(Debug, Clone)]
pub struct ControllerRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub body: Bytes,
    /// Propagated to every node as `X-Request-ID`
    pub request_id: Option<String>,
}

impl ControllerRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryParams::default(),
            body: Bytes::new(),
            request_id: None,
        }
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// A validated call, ready to fan out
#[derive(Debug, Clone)]
pub struct DispatchPlan {
    pub operation: Operation,
    pub template: RequestTemplate,
    pub targets: Vec<NodeDescriptor>,
}

pub struct Controller {
    registry: Arc<dyn NodeRegistry>,
    dispatcher: Dispatcher,
    routes: RouteTable,
}

impl Controller {
    pub fn new(registry: Arc<dyn NodeRegistry>, dispatcher: Dispatcher) -> Result<Self> {
        Ok(Self {
            registry,
            dispatcher,
            routes: RouteTable::standard()?,
        })
    }

    pub fn registry(&self) -> &Arc<dyn NodeRegistry> {
        &self.registry
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Validate a request and work out what to send where. No network I/O.
    pub fn plan(&self, request: &ControllerRequest) -> Result<DispatchPlan> {
        let matched = self.routes.lookup(&request.method, &request.path)?;
        let operation = matched.route.operation;

        let template = build_template(&matched, request)?;

        let node_ids = request.query.get_all(NODE_ID_PARAM);
        let (scope, explicit) = Scope::from_query(request.query.get(SCOPE_PARAM), &node_ids)?;
        let snapshot = self.registry.snapshot();
        let targets = resolve(&snapshot, &scope, &explicit)?;

        Ok(DispatchPlan {
            operation,
            template,
            targets,
        })
    }

    /// Run a management call end to end
    pub async fn handle(&self, request: ControllerRequest) -> Result<AggregateResponse> {
        self.handle_until(request, std::future::pending()).await
    }

    /// Like [`handle`](Self::handle), abandoning the fan-out when `cancel` fires
    pub async fn handle_until<F>(&self, request: ControllerRequest, cancel: F) -> Result<AggregateResponse>
    where
        F: Future<Output = ()>,
    {
        let plan = self.plan(&request).inspect_err(|e| {
            tracing::info!("Rejected {} {}: {}", request.method, request.path, e);
        })?;

        tracing::info!(
            operation = ?plan.operation,
            targets = plan.targets.len(),
            "{}: forwarding {} {}",
            plan.operation.description(),
            plan.template.method(),
            plan.template.path()
        );

        let results = self
            .dispatcher
            .dispatch_until(&plan.template, &plan.targets, cancel)
            .await?;
        let response = aggregate(results)?;

        tracing::info!(
            operation = ?plan.operation,
            status = response.status,
            nodes = response.node_count(),
            "Aggregated response"
        );

        Ok(response)
    }
}

fn build_template(matched: &RouteMatch, request: &ControllerRequest) -> Result<RequestTemplate> {
    let route = &matched.route;
    let mut builder = RequestTemplate::builder(route.method.clone(), route.pattern).accept(TEXT_PLAIN);

    for (name, value) in &matched.params {
        builder = builder.resolve(name.as_str(), value.as_str());
    }

    match route.operation {
        Operation::GetLog => {
            let query = LogQuery {
                range: parse_time_range(request.query.get("from"), request.query.get("to"))?,
                level: parse_level(request.query.get("level"))?,
                limit: parse_limit(request.query.get("n"))?,
            };
            for (key, value) in query.query_pairs() {
                builder = builder.query(key, value);
            }
        }
        Operation::DeleteLog => {
            if let Some(to) = parse_time_bound("to", request.query.get("to"))?.to_query_value() {
                builder = builder.query("to", to);
            }
        }
        _ => {}
    }

    if route.operation.forwards_body() {
        builder = builder.body(TEXT_PLAIN, request.body.clone());
    }
    if let Some(id) = &request.request_id {
        builder = builder.header(REQUEST_ID_HEADER, id.as_str());
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Error, NodeRole};
    use crate::controller::aggregate::{AggregateBody, MULTI_STATUS};
    use crate::controller::registry::StaticRegistry;
    use crate::controller::transport::mock::{Behavior, MockTransport};
    use axum::extract::Query;
    use std::time::Duration;

    fn node(id: &str, role: NodeRole) -> NodeDescriptor {
        NodeDescriptor::new(id, format!("http://{}:8081", id), role)
    }

    fn controller(transport: Arc<MockTransport>, timeout_ms: u64) -> Controller {
        let registry = StaticRegistry::new(vec![
            node("c1", NodeRole::Coordinator),
            node("w1", NodeRole::Worker),
            node("w2", NodeRole::Worker),
        ])
        .unwrap();
        let dispatcher = Dispatcher::new(transport, Duration::from_millis(timeout_ms), 4);
        Controller::new(Arc::new(registry), dispatcher).unwrap()
    }

    fn query(raw: &str) -> QueryParams {
        let uri: axum::http::Uri = format!("/?{}", raw).parse().unwrap();
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&uri).unwrap();
        QueryParams::from_pairs(pairs)
    }

    #[tokio::test]
    async fn test_worker_scope_scenario() {
        let transport = Arc::new(MockTransport::new(&[
            ("w1", Behavior::Respond(200, "ok")),
            ("w2", Behavior::Respond(500, "err")),
        ]));
        let c = controller(transport.clone(), 1_000);

        let request = ControllerRequest::new(Method::GET, "/connectors/tpch.properties")
            .with_query(query("scope=worker"));
        let response = c.handle(request).await.unwrap();

        assert_eq!(response.status, MULTI_STATUS);
        let AggregateBody::Multi(entries) = response.body else {
            panic!("expected multi-status body");
        };
        let summary: Vec<(&str, Option<u16>, Option<&str>)> = entries
            .iter()
            .map(|e| (e.node_id.as_str(), e.status, e.body.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![("w1", Some(200), Some("ok")), ("w2", Some(500), Some("err"))]
        );
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_single_node_passthrough() {
        let transport = Arc::new(MockTransport::new(&[("w1", Behavior::Respond(200, "ok"))]));
        let c = controller(transport, 1_000);

        let request = ControllerRequest::new(Method::GET, "/connectors/a.properties/x")
            .with_query(query("nodeId=w1"));
        let response = c.handle(request).await.unwrap();

        assert_eq!(response.status, 200);
        assert!(matches!(response.body, AggregateBody::Raw { ref body, .. } if body == "ok"));
    }

    #[tokio::test]
    async fn test_three_targets_one_timeout() {
        let transport = Arc::new(MockTransport::new(&[("w2", Behavior::Hang)]));
        let c = controller(transport, 50);

        let response = c
            .handle(ControllerRequest::new(Method::GET, "/connectors"))
            .await
            .unwrap();

        assert_eq!(response.status, MULTI_STATUS);
        let AggregateBody::Multi(entries) = response.body else {
            panic!("expected multi-status body");
        };
        assert_eq!(entries.len(), 3);
        assert_eq!(entries.iter().filter(|e| e.is_error()).count(), 1);
        assert_eq!(entries[2].node_id, "w2");
        assert!(entries[2].is_error());
        for entry in &entries[..2] {
            assert_eq!(entry.status, Some(200));
            assert_eq!(entry.body.as_deref(), Some("ok"));
        }
    }

    #[tokio::test]
    async fn test_rejections_make_no_calls() {
        let transport = Arc::new(MockTransport::new(&[]));
        let c = controller(transport.clone(), 1_000);

        let cases = [
            (ControllerRequest::new(Method::GET, "/connectors").with_query(query("scope=nobody")), 400),
            (
                ControllerRequest::new(Method::GET, "/connectors")
                    .with_query(query("scope=coordinator&nodeId=w1")),
                400,
            ),
            (ControllerRequest::new(Method::GET, "/connectors").with_query(query("nodeId=w9")), 400),
            (
                ControllerRequest::new(Method::GET, "/logs/server.log").with_query(query("from=yesterday")),
                400,
            ),
            (
                ControllerRequest::new(Method::GET, "/logs/server.log").with_query(query("level=LOUD")),
                400,
            ),
            (ControllerRequest::new(Method::GET, "/plugins"), 404),
            (ControllerRequest::new(Method::PATCH, "/connectors"), 405),
        ];

        for (request, status) in cases {
            let err = c.handle(request.clone()).await.unwrap_err();
            assert_eq!(err.to_http_status().as_u16(), status, "{:?}", request);
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_target_nodes() {
        let transport = Arc::new(MockTransport::new(&[]));
        let c = controller(transport.clone(), 1_000);

        let request = ControllerRequest::new(Method::DELETE, "/connectors/a.properties")
            .with_query(query("scope=coordinator&nodeId=w2"));
        assert!(matches!(c.handle(request).await, Err(Error::NoTargetNodes)));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_plan_forwards_body_and_request_id() {
        let c = controller(Arc::new(MockTransport::new(&[])), 1_000);

        let request = ControllerRequest::new(Method::PUT, "/connectors/hive.properties/hive.metastore.uri")
            .with_query(query("scope=COORDINATOR"))
            .with_body("thrift://meta:9083")
            .with_request_id("req-1");
        let plan = c.plan(&request).unwrap();

        assert_eq!(plan.operation, Operation::UpdateConnectorProperty);
        assert_eq!(plan.targets.len(), 1);
        assert_eq!(plan.targets[0].id, "c1");
        assert_eq!(plan.template.path(), "/connectors/hive.properties/hive.metastore.uri");
        assert_eq!(plan.template.body().unwrap().as_ref(), b"thrift://meta:9083");
        assert_eq!(
            plan.template.headers(),
            &[(REQUEST_ID_HEADER.to_string(), "req-1".to_string())]
        );
    }

    #[test]
    fn test_plan_log_query_is_canonical() {
        let c = controller(Arc::new(MockTransport::new(&[])), 1_000);

        let request = ControllerRequest::new(Method::GET, "/logs/server.log").with_query(query(
            "from=2017-06-23&level=warn&n=5&scope=worker&nodeId=w1",
        ));
        let plan = c.plan(&request).unwrap();

        assert_eq!(
            plan.template.path_and_query(),
            "/logs/server.log?from=2017-06-23T00:00:00.000Z&level=WARN&n=5"
        );
        assert!(plan.template.body().is_none());
    }

    #[test]
    fn test_plan_delete_log_keeps_only_to() {
        let c = controller(Arc::new(MockTransport::new(&[])), 1_000);

        let request = ControllerRequest::new(Method::DELETE, "/logs/server.log")
            .with_query(query("to=DEFAULT&level=INFO"));
        let plan = c.plan(&request).unwrap();
        assert_eq!(plan.template.path_and_query(), "/logs/server.log");
        assert_eq!(plan.targets.len(), 3);
    }
}
