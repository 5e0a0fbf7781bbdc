//! Node transport: executes one template against one node

use crate::controller::registry::NodeDescriptor;
use crate::controller::template::RequestTemplate;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use std::time::Duration;

/// Raw response received from a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl NodeResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Transport-level failure (no HTTP response was received)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout(String),
    ConnectionRefused(String),
    Other(String),
}

/// Executes calls against nodes.
///
/// Implementations return the node's response verbatim, whatever its status.
pub trait NodeTransport: Send + Sync {
    fn execute<'a>(
        &'a self,
        node: &'a NodeDescriptor,
        template: &'a RequestTemplate,
    ) -> BoxFuture<'a, Result<NodeResponse, TransportError>>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| crate::Error::Internal(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        node: &NodeDescriptor,
        template: &RequestTemplate,
    ) -> Result<NodeResponse, TransportError> {
        let url = template.url_for(node);
        let mut request = self.client.request(template.method().clone(), &url);

        if let Some(accept) = template.accept() {
            request = request.header(ACCEPT, accept);
        }
        for (name, value) in template.headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = template.body() {
            if let Some(content_type) = template.content_type() {
                request = request.header(CONTENT_TYPE, content_type);
            }
            request = request.body(body.clone());
        }

        let response = request.send().await.map_err(|e| classify(&url, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.bytes().await.map_err(|e| classify(&url, e))?;

        Ok(NodeResponse {
            status,
            content_type,
            body,
        })
    }
}

fn classify(url: &str, e: reqwest::Error) -> TransportError {
    let message = format!("{}: {}", url, e);
    if e.is_timeout() {
        TransportError::Timeout(message)
    } else if e.is_connect() {
        TransportError::ConnectionRefused(message)
    } else {
        TransportError::Other(message)
    }
}

impl NodeTransport for HttpTransport {
    fn execute<'a>(
        &'a self,
        node: &'a NodeDescriptor,
        template: &'a RequestTemplate,
    ) -> BoxFuture<'a, Result<NodeResponse, TransportError>> {
        Box::pin(self.send(node, template))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NodeRole;
    use axum::http::Method;

    #[tokio::test]
    async fn test_refused_connection_is_classified() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(Duration::from_secs(1)).unwrap();
        let node = NodeDescriptor::new("w1", format!("http://{}", addr), NodeRole::Worker);
        let template = RequestTemplate::builder(Method::GET, "/connectors")
            .build()
            .unwrap();

        let result = transport.execute(&node, &template).await;
        assert!(matches!(result, Err(TransportError::ConnectionRefused(_))));
    }
}
