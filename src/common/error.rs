//! Error types for clustermgr

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Request validation (reported before any node is contacted) ===
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("No target nodes match the requested scope")]
    NoTargetNodes,

    // === Routing ===
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },

    // === Programming defects ===
    #[error("Unresolved request template: {0}")]
    UnresolvedTemplate(String),

    // === Registry / config Errors ===
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Dispatch ===
    #[error("Dispatch cancelled")]
    Cancelled,

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a malformed-request error? These are raised while the request
    /// is still being validated, so no node has been contacted yet.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidParameter(_)
                | Error::UnknownNode(_)
                | Error::NoTargetNodes
                | Error::NotFound(_)
                | Error::MethodNotAllowed { .. }
        )
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> StatusCode {
        match self {
            Error::InvalidParameter(_) | Error::UnknownNode(_) | Error::NoTargetNodes => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.to_http_status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
