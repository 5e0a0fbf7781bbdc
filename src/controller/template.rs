//! Request templates
//!
//! A [`RequestTemplate`] is the fully resolved description of one management
//! call. It is built once per incoming request and then shared read-only by
//! every per-node call; only the destination address differs between nodes.

use crate::common::utils::{encode_query, encode_segment};
use crate::common::{Error, Result};
use crate::controller::registry::NodeDescriptor;
use axum::http::Method;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";

/// One `/`-separated segment of a path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Param(String),
}

/// Split a pattern like `/connectors/{file}/{property}` into segments.
///
/// Placeholders must span a whole segment.
pub(crate) fn parse_pattern(pattern: &str) -> Result<Vec<Segment>> {
    if !pattern.starts_with('/') {
        return Err(Error::UnresolvedTemplate(format!(
            "path pattern must start with '/': {}",
            pattern
        )));
    }

    pattern
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) if !name.is_empty() && !name.contains(['{', '}']) => {
                Ok(Segment::Param(name.to_string()))
            }
            Some(_) => Err(Error::UnresolvedTemplate(format!(
                "malformed placeholder '{}' in {}",
                s, pattern
            ))),
            None if s.contains(['{', '}']) => Err(Error::UnresolvedTemplate(format!(
                "placeholder must span a whole segment: '{}' in {}",
                s, pattern
            ))),
            None => Ok(Segment::Literal(s.to_string())),
        })
        .collect()
}

/// Immutable, fully resolved call description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    accept: Option<String>,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl RequestTemplate {
    /// Start a template for `method` against a path pattern
    pub fn builder(method: Method, pattern: impl Into<String>) -> RequestTemplateBuilder {
        RequestTemplateBuilder {
            method,
            pattern: pattern.into(),
            bindings: BTreeMap::new(),
            query: Vec::new(),
            accept: None,
            content_type: None,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Literal path, placeholders substituted and percent-encoded
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Path plus encoded query string
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, encode_query(&self.query))
        }
    }

    /// Absolute URL of this call on a given node
    pub fn url_for(&self, node: &NodeDescriptor) -> String {
        format!(
            "{}{}",
            node.address.trim_end_matches('/'),
            self.path_and_query()
        )
    }
}

/// Consuming builder for [`RequestTemplate`]. Nothing is checked until
/// [`build`](RequestTemplateBuilder::build).
#[derive(Debug, Clone)]
pub struct RequestTemplateBuilder {
    method: Method,
    pattern: String,
    bindings: BTreeMap<String, String>,
    query: Vec<(String, String)>,
    accept: Option<String>,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl RequestTemplateBuilder {
    /// Bind a placeholder to a literal value
    pub fn resolve(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    pub fn accept(mut self, media_type: impl Into<String>) -> Self {
        self.accept = Some(media_type.into());
        self
    }

    /// Append a query pair (repeatable keys allowed)
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }

    /// Validate and freeze.
    ///
    /// Fails with `UnresolvedTemplate` when a placeholder has no value or a
    /// value names no placeholder, and with `InvalidParameter` when a value
    /// is not a usable path segment.
    pub fn build(self) -> Result<RequestTemplate> {
        let segments = parse_pattern(&self.pattern)?;
        let mut used = BTreeSet::new();
        let mut path = String::new();

        for segment in &segments {
            path.push('/');
            match segment {
                Segment::Literal(s) => path.push_str(s),
                Segment::Param(name) => {
                    let value = self.bindings.get(name).ok_or_else(|| {
                        Error::UnresolvedTemplate(format!(
                            "placeholder {{{}}} in {} has no value",
                            name, self.pattern
                        ))
                    })?;
                    if value.is_empty() || value == "." || value == ".." {
                        return Err(Error::InvalidParameter(format!(
                            "invalid value for {}: '{}'",
                            name, value
                        )));
                    }
                    path.push_str(&encode_segment(value));
                    used.insert(name.as_str());
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }

        if let Some(unknown) = self
            .bindings
            .keys()
            .find(|name| !used.contains(name.as_str()))
        {
            return Err(Error::UnresolvedTemplate(format!(
                "no placeholder {{{}}} in {}",
                unknown, self.pattern
            )));
        }

        Ok(RequestTemplate {
            method: self.method,
            path,
            query: self.query,
            accept: self.accept,
            content_type: self.content_type,
            headers: self.headers,
            body: self.body,
        })
    }
}
