//! Response aggregation
//!
//! A single target is a transparent passthrough: the caller sees exactly what
//! the node answered. Several targets always produce `207 Multi-Status` with
//! one JSON entry per node, in node ID order.
//!
//! Multi-status bodies are JSON strings, so a node body that is not valid
//! UTF-8 is decoded lossily (invalid sequences become U+FFFD) and its entry
//! carries `"bodyLossy": true`. Single-target passthrough keeps the raw bytes.

use crate::common::{Error, Result};
use crate::controller::dispatcher::{NodeFailure, NodeOutcome, NodeResult};
use crate::controller::template::{APPLICATION_JSON, TEXT_PLAIN};
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub const MULTI_STATUS: u16 = 207;

/// Status used when a single target timed out
pub const GATEWAY_TIMEOUT: u16 = 504;
/// Status used when a single target could not be reached
pub const BAD_GATEWAY: u16 = 502;

/// Per-node entry of a multi-status body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEntry {
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// `body` is not byte-for-byte what the node sent
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub body_lossy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EntryError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryError {
    pub kind: String,
    pub message: String,
}

impl NodeEntry {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl From<NodeResult> for NodeEntry {
    fn from(result: NodeResult) -> Self {
        let (status, body, body_lossy, error) = match result.outcome {
            NodeOutcome::Success(resp) | NodeOutcome::Failure(NodeFailure::NonSuccessStatus(resp)) => {
                let (body, lossy) = match String::from_utf8(resp.body.to_vec()) {
                    Ok(body) => (body, false),
                    Err(e) => (String::from_utf8_lossy(e.as_bytes()).into_owned(), true),
                };
                (Some(resp.status), Some(body), lossy, None)
            }
            NodeOutcome::Failure(failure) => (
                None,
                None,
                false,
                Some(EntryError {
                    kind: failure.kind().to_string(),
                    message: failure.message(),
                }),
            ),
        };

        Self {
            node_id: result.node_id,
            status,
            body,
            body_lossy,
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateBody {
    /// Body of a single node, forwarded as received
    Raw {
        content_type: Option<String>,
        body: Bytes,
    },
    /// One entry per node
    Multi(Vec<NodeEntry>),
}

/// Consolidated answer to one management call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResponse {
    pub status: u16,
    pub body: AggregateBody,
}

impl AggregateResponse {
    /// Number of nodes represented in this response
    pub fn node_count(&self) -> usize {
        match &self.body {
            AggregateBody::Raw { .. } => 1,
            AggregateBody::Multi(entries) => entries.len(),
        }
    }
}

/// Merge per-node results into one response. Pure; never touches the network.
pub fn aggregate(mut results: Vec<NodeResult>) -> Result<AggregateResponse> {
    match results.len() {
        0 => Err(Error::Internal("no node results to aggregate".into())),
        1 => Ok(passthrough(results.remove(0))),
        _ => Ok(AggregateResponse {
            status: MULTI_STATUS,
            body: AggregateBody::Multi(results.into_iter().map(NodeEntry::from).collect()),
        }),
    }
}

fn passthrough(result: NodeResult) -> AggregateResponse {
    let text = |status: u16, message: String| AggregateResponse {
        status,
        body: AggregateBody::Raw {
            content_type: Some(TEXT_PLAIN.to_string()),
            body: Bytes::from(message),
        },
    };

    match result.outcome {
        NodeOutcome::Success(resp) | NodeOutcome::Failure(NodeFailure::NonSuccessStatus(resp)) => {
            AggregateResponse {
                status: resp.status,
                body: AggregateBody::Raw {
                    content_type: resp.content_type,
                    body: resp.body,
                },
            }
        }
        NodeOutcome::Failure(f @ NodeFailure::Timeout(_)) => text(GATEWAY_TIMEOUT, f.message()),
        NodeOutcome::Failure(f) => text(BAD_GATEWAY, f.message()),
    }
}

impl IntoResponse for AggregateResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);

        match self.body {
            AggregateBody::Raw { content_type, body } => {
                let mut response = (status, body).into_response();
                match content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
                    Some(value) => {
                        response.headers_mut().insert(CONTENT_TYPE, value);
                    }
                    None => {
                        response.headers_mut().remove(CONTENT_TYPE);
                    }
                }
                response
            }
            AggregateBody::Multi(entries) => match serde_json::to_vec(&entries) {
                Ok(json) => (status, [(CONTENT_TYPE, APPLICATION_JSON)], json).into_response(),
                Err(e) => Error::Internal(format!("failed to encode response: {}", e)).into_response(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::transport::NodeResponse;

    fn ok(id: &str, status: u16, body: &'static str) -> NodeResult {
        let resp = NodeResponse::new(status, body);
        NodeResult {
            node_id: id.to_string(),
            outcome: if (200..300).contains(&status) {
                NodeOutcome::Success(resp)
            } else {
                NodeOutcome::Failure(NodeFailure::NonSuccessStatus(resp))
            },
        }
    }

    fn failed(id: &str, failure: NodeFailure) -> NodeResult {
        NodeResult {
            node_id: id.to_string(),
            outcome: NodeOutcome::Failure(failure),
        }
    }

    #[test]
    fn test_single_success_is_passthrough() {
        let resp = aggregate(vec![ok("w1", 200, "ok")]).unwrap();
        assert_eq!(
            resp,
            AggregateResponse {
                status: 200,
                body: AggregateBody::Raw {
                    content_type: None,
                    body: Bytes::from_static(b"ok"),
                },
            }
        );
    }

    #[test]
    fn test_single_failure_is_passthrough() {
        let resp = aggregate(vec![ok("w1", 404, "no such file")]).unwrap();
        assert_eq!(resp.status, 404);
        assert!(matches!(resp.body, AggregateBody::Raw { ref body, .. } if body == "no such file"));

        let resp = aggregate(vec![ok("w1", 202, "")]).unwrap();
        assert_eq!(resp.status, 202);
    }

    #[test]
    fn test_single_transport_failures() {
        let resp = aggregate(vec![failed("w1", NodeFailure::Timeout("slow".into()))]).unwrap();
        assert_eq!(resp.status, GATEWAY_TIMEOUT);

        let resp =
            aggregate(vec![failed("w1", NodeFailure::ConnectionRefused("down".into()))]).unwrap();
        assert_eq!(resp.status, BAD_GATEWAY);
    }

    #[test]
    fn test_multi_status_keeps_every_node() {
        let resp = aggregate(vec![
            ok("w1", 200, "ok"),
            failed("w2", NodeFailure::Timeout("no response".into())),
            ok("w3", 200, "fine"),
        ])
        .unwrap();

        assert_eq!(resp.status, MULTI_STATUS);
        assert_eq!(resp.node_count(), 3);
        let AggregateBody::Multi(entries) = resp.body else {
            panic!("expected multi-status body");
        };
        assert_eq!(entries.iter().filter(|e| e.is_error()).count(), 1);
        assert_eq!(entries[0].status, Some(200));
        assert_eq!(entries[0].body.as_deref(), Some("ok"));
        assert_eq!(entries[1].error.as_ref().unwrap().kind, "timeout");
        assert_eq!(entries[2].body.as_deref(), Some("fine"));
    }

    #[test]
    fn test_multi_status_even_when_all_succeed() {
        let resp = aggregate(vec![ok("w1", 200, "a"), ok("w2", 200, "a")]).unwrap();
        assert_eq!(resp.status, MULTI_STATUS);
    }

    #[test]
    fn test_worker_scope_scenario_json() {
        let resp = aggregate(vec![ok("w1", 200, "ok"), ok("w2", 500, "err")]).unwrap();
        let AggregateBody::Multi(entries) = resp.body else {
            panic!("expected multi-status body");
        };
        assert_eq!(
            serde_json::to_value(&entries).unwrap(),
            serde_json::json!([
                {"nodeId": "w1", "status": 200, "body": "ok"},
                {"nodeId": "w2", "status": 500, "body": "err"}
            ])
        );
    }

    #[test]
    fn test_non_utf8_body_is_flagged() {
        let results = vec![
            NodeResult {
                node_id: "w1".to_string(),
                outcome: NodeOutcome::Success(NodeResponse::new(200, &b"ok \xff"[..])),
            },
            ok("w2", 200, "fine"),
        ];
        let resp = aggregate(results).unwrap();
        let AggregateBody::Multi(entries) = resp.body else {
            panic!("expected multi-status body");
        };

        assert_eq!(entries[0].body.as_deref(), Some("ok \u{FFFD}"));
        assert!(entries[0].body_lossy);
        assert!(!entries[1].body_lossy);

        let json = serde_json::to_value(&entries).unwrap();
        assert_eq!(json[0]["bodyLossy"], true);
        assert!(json[1].get("bodyLossy").is_none());
    }

    #[test]
    fn test_empty_results_rejected() {
        assert!(aggregate(vec![]).is_err());
    }
}
