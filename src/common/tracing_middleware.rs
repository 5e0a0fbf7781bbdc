//! Structured logging and request tracing middleware
//!
//! Every request gets a request ID (taken from `X-Request-ID` when the caller
//! supplies one). The ID is echoed back in the response, stored in the request
//! extensions for handlers, and forwarded to every node a call fans out to.

use axum::{
    body::Body,
    http::{HeaderValue, Request, Response, StatusCode},
    middleware::Next,
};
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Request ID attached to the request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Generate a new unique request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Middleware that adds request ID and structured logging to each request
pub async fn request_tracing_middleware(mut request: Request<Body>, next: Next) -> Response<Body> {
    let start = Instant::now();

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(generate_request_id);

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        info!("Request started");

        let mut response = next.run(request).await;

        let duration = start.elapsed();
        let status = response.status();

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        let message = completion_message(status);
        if status.is_client_error() || status.is_server_error() {
            warn!(
                status = %status.as_u16(),
                duration_ms = %duration.as_millis(),
                "{}", message
            );
        } else {
            info!(
                status = %status.as_u16(),
                duration_ms = %duration.as_millis(),
                "{}", message
            );
        }

        response
    }
    .instrument(span)
    .await
}

/// Log line for a finished request, by status class
fn completion_message(status: StatusCode) -> &'static str {
    if status.is_server_error() {
        "Server error"
    } else if status.is_client_error() {
        "Client error"
    } else {
        "Request completed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_id() {
        let id1 = generate_request_id();
        let id2 = generate_request_id();

        // Should be valid UUIDs
        assert!(Uuid::parse_str(&id1).is_ok());
        assert!(Uuid::parse_str(&id2).is_ok());

        // Should be unique
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_completion_message_by_status_class() {
        assert_eq!(completion_message(StatusCode::OK), "Request completed");
        assert_eq!(completion_message(StatusCode::MULTI_STATUS), "Request completed");
        assert_eq!(completion_message(StatusCode::SWITCHING_PROTOCOLS), "Request completed");
        assert_eq!(completion_message(StatusCode::NOT_MODIFIED), "Request completed");
        assert_eq!(completion_message(StatusCode::NOT_FOUND), "Client error");
        assert_eq!(completion_message(StatusCode::BAD_GATEWAY), "Server error");
    }
}
