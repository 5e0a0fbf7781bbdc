//! Route table for forwarded management calls
//!
//! Maps (method, path pattern) to an [`Operation`]. Lookup is plain data
//! matching; the HTTP layer feeds it method and path and gets back the
//! operation plus decoded path parameters.

use crate::common::utils::decode_segment;
use crate::common::{Error, Result};
use crate::controller::template::{parse_pattern, Segment};
use axum::http::Method;
use std::collections::BTreeMap;

/// Management operations the controller forwards to nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListConnectors,
    GetConnectorFile,
    GetConnectorProperty,
    UpdateConnectorProperty,
    SetConnectorFileByUrl,
    DeleteConnectorFile,
    DeleteConnectorProperty,
    GetLog,
    DeleteLog,
}

impl Operation {
    /// Does the request body travel with the call?
    pub fn forwards_body(&self) -> bool {
        matches!(
            self,
            Operation::UpdateConnectorProperty | Operation::SetConnectorFileByUrl
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            Operation::ListConnectors => "List connector file names",
            Operation::GetConnectorFile => "Get contents of a connector file",
            Operation::GetConnectorProperty => "Get connector property by file",
            Operation::UpdateConnectorProperty => "Update or create a property of a connector file",
            Operation::SetConnectorFileByUrl => "Replace a connector file with the file at the given URL",
            Operation::DeleteConnectorFile => "Delete a connector file",
            Operation::DeleteConnectorProperty => "Delete a property of a connector file",
            Operation::GetLog => "Get log entries",
            Operation::DeleteLog => "Delete logs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    /// Path pattern on the controller; nodes serve the same path
    pub pattern: &'static str,
    pub operation: Operation,
}

const fn route(method: Method, pattern: &'static str, operation: Operation) -> Route {
    Route {
        method,
        pattern,
        operation,
    }
}

/// Every forwarded route
pub static ROUTES: [Route; 9] = [
    route(Method::GET, "/connectors", Operation::ListConnectors),
    route(Method::GET, "/connectors/{file}", Operation::GetConnectorFile),
    route(Method::POST, "/connectors/{file}", Operation::SetConnectorFileByUrl),
    route(Method::DELETE, "/connectors/{file}", Operation::DeleteConnectorFile),
    route(Method::GET, "/connectors/{file}/{property}", Operation::GetConnectorProperty),
    route(Method::PUT, "/connectors/{file}/{property}", Operation::UpdateConnectorProperty),
    route(Method::DELETE, "/connectors/{file}/{property}", Operation::DeleteConnectorProperty),
    route(Method::GET, "/logs/{file}", Operation::GetLog),
    route(Method::DELETE, "/logs/{file}", Operation::DeleteLog),
];

/// A successful lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub route: Route,
    /// Decoded placeholder values
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<(Route, Vec<Segment>)>,
}

impl RouteTable {
    pub fn new(routes: &[Route]) -> Result<Self> {
        let routes = routes
            .iter()
            .map(|r| Ok((r.clone(), parse_pattern(r.pattern)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { routes })
    }

    /// Table with every forwarded route
    pub fn standard() -> Result<Self> {
        Self::new(&ROUTES)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().map(|(r, _)| r)
    }

    /// Find the route for a request.
    ///
    /// `NotFound` when no pattern matches the path, `MethodNotAllowed` when
    /// one does but not for this method.
    pub fn lookup(&self, method: &Method, path: &str) -> Result<RouteMatch> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut path_known = false;

        for (route, segments) in &self.routes {
            let Some(params) = match_segments(segments, &parts)? else {
                continue;
            };
            if route.method == *method {
                return Ok(RouteMatch {
                    route: route.clone(),
                    params,
                });
            }
            path_known = true;
        }

        if path_known {
            Err(Error::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            })
        } else {
            Err(Error::NotFound(path.to_string()))
        }
    }
}

fn match_segments(segments: &[Segment], parts: &[&str]) -> Result<Option<BTreeMap<String, String>>> {
    if segments.len() != parts.len() {
        return Ok(None);
    }

    let mut params = BTreeMap::new();
    for (segment, part) in segments.iter().zip(parts) {
        match segment {
            Segment::Literal(lit) if lit == part => {}
            Segment::Literal(_) => return Ok(None),
            Segment::Param(name) => {
                params.insert(name.clone(), decode_segment(part)?);
            }
        }
    }
    Ok(Some(params))
}
