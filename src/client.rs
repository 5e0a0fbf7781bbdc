//! Client for the controller's HTTP API (used by the `clustermgr` CLI)

use crate::common::utils::{encode_query, encode_segment};
use crate::common::{Error, Result};
use crate::controller::scope::{NODE_ID_PARAM, SCOPE_PARAM};
use reqwest::Method;

/// Which nodes a call should reach
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub scope: Option<String>,
    pub node_ids: Vec<String>,
}

/// Status and body as returned by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResponse {
    pub status: u16,
    pub body: String,
}

impl ClientResponse {
    pub fn is_multi_status(&self) -> bool {
        self.status == 207
    }
}

pub struct ManagementClient {
    base_url: String,
    client: reqwest::Client,
}

impl ManagementClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build the controller URL for a path made of raw (unencoded) segments
    pub fn url(&self, segments: &[&str], target: &Target, extra: &[(String, String)]) -> String {
        let path: String = segments
            .iter()
            .map(|s| format!("/{}", encode_segment(s)))
            .collect();

        let mut pairs: Vec<(String, String)> = Vec::new();
        if let Some(scope) = &target.scope {
            pairs.push((SCOPE_PARAM.to_string(), scope.clone()));
        }
        for id in &target.node_ids {
            pairs.push((NODE_ID_PARAM.to_string(), id.clone()));
        }
        pairs.extend(extra.iter().cloned());

        if pairs.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, encode_query(&pairs))
        }
    }

    pub async fn call(
        &self,
        method: Method,
        segments: &[&str],
        target: &Target,
        extra: &[(String, String)],
        body: Option<String>,
    ) -> Result<ClientResponse> {
        let url = self.url(segments, target, extra);
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Other(format!("request to {} failed: {}", url, e)))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Other(format!("failed to read response from {}: {}", url, e)))?;

        Ok(ClientResponse { status, body })
    }

    pub async fn nodes(&self) -> Result<ClientResponse> {
        self.call(Method::GET, &["nodes"], &Target::default(), &[], None)
            .await
    }
}
