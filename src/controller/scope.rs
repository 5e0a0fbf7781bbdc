//! Scope resolution: which nodes does a call go to?

use crate::common::{Error, NodeRole, Result};
use crate::controller::registry::{NodeDescriptor, NodeSnapshot};
use std::collections::BTreeSet;

/// Query parameter carrying the scope token
pub const SCOPE_PARAM: &str = "scope";
/// Repeatable query parameter carrying explicit node IDs
pub const NODE_ID_PARAM: &str = "nodeId";

/// Which part of the cluster a call targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Coordinator,
    Worker,
    /// Exactly these node IDs, whatever their role
    Nodes(BTreeSet<String>),
}

impl Scope {
    /// Parse a scope token (case-insensitive)
    pub fn parse(token: &str) -> Result<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Scope::All),
            "coordinator" => Ok(Scope::Coordinator),
            "worker" => Ok(Scope::Worker),
            _ => Err(Error::InvalidParameter(format!(
                "invalid scope '{}': expected all, coordinator or worker",
                token
            ))),
        }
    }

    /// Build the scope from the `scope` and `nodeId` query values.
    ///
    /// A missing token means `All`, or `Nodes(ids)` when IDs were given.
    /// Returns the scope plus the deduplicated explicit IDs.
    pub fn from_query(token: Option<&str>, node_ids: &[&str]) -> Result<(Self, BTreeSet<String>)> {
        let mut ids = BTreeSet::new();
        for id in node_ids {
            let id = id.trim();
            if id.is_empty() {
                return Err(Error::InvalidParameter("nodeId must not be empty".into()));
            }
            ids.insert(id.to_string());
        }

        let scope = match token {
            Some(t) => Scope::parse(t)?,
            None if !ids.is_empty() => Scope::Nodes(ids.clone()),
            None => Scope::All,
        };

        Ok((scope, ids))
    }

    fn admits(&self, node: &NodeDescriptor) -> bool {
        match self {
            Scope::All => true,
            Scope::Coordinator => node.role == NodeRole::Coordinator,
            Scope::Worker => node.role == NodeRole::Worker,
            Scope::Nodes(ids) => ids.contains(&node.id),
        }
    }
}

/// Resolve a scope against a snapshot.
///
/// Unknown explicit IDs are rejected with `UnknownNode` rather than skipped,
/// so a typo never shrinks the target set silently. The result is ordered by
/// node ID and is never empty.
pub fn resolve(
    snapshot: &NodeSnapshot,
    scope: &Scope,
    explicit_ids: &BTreeSet<String>,
) -> Result<Vec<NodeDescriptor>> {
    let scope_ids = match scope {
        Scope::Nodes(ids) => Some(ids),
        _ => None,
    };
    if let Some(unknown) = explicit_ids
        .iter()
        .chain(scope_ids.into_iter().flatten())
        .find(|id| !snapshot.contains(id))
    {
        return Err(Error::UnknownNode(unknown.clone()));
    }

    let targets: Vec<NodeDescriptor> = snapshot
        .iter()
        .filter(|node| scope.admits(node))
        .filter(|node| explicit_ids.is_empty() || explicit_ids.contains(&node.id))
        .cloned()
        .collect();

    if targets.is_empty() {
        return Err(Error::NoTargetNodes);
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, role: NodeRole) -> NodeDescriptor {
        NodeDescriptor::new(id, format!("http://{}:8081", id), role)
    }

    fn cluster() -> NodeSnapshot {
        NodeSnapshot::new(vec![
            node("c1", NodeRole::Coordinator),
            node("w1", NodeRole::Worker),
            node("w2", NodeRole::Worker),
            node("w3", NodeRole::Worker),
        ])
        .unwrap()
    }

    fn ids(nodes: &[NodeDescriptor]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Scope::parse("ALL").unwrap(), Scope::All);
        assert_eq!(Scope::parse("Coordinator").unwrap(), Scope::Coordinator);
        assert_eq!(Scope::parse("worker").unwrap(), Scope::Worker);
        assert!(matches!(Scope::parse("leaders"), Err(Error::InvalidParameter(_))));
        assert!(Scope::parse("").is_err());
    }

    #[test]
    fn test_all_yields_every_node() {
        let snapshot = cluster();
        let targets = resolve(&snapshot, &Scope::All, &BTreeSet::new()).unwrap();
        assert_eq!(targets.len(), snapshot.len());
    }

    #[test]
    fn test_role_scopes_filter_by_role() {
        let snapshot = cluster();

        let coords = resolve(&snapshot, &Scope::Coordinator, &BTreeSet::new()).unwrap();
        assert!(coords.iter().all(|n| n.role == NodeRole::Coordinator));
        assert_eq!(ids(&coords), vec!["c1"]);

        let workers = resolve(&snapshot, &Scope::Worker, &BTreeSet::new()).unwrap();
        assert!(workers.iter().all(|n| n.role == NodeRole::Worker));
        assert_eq!(ids(&workers), vec!["w1", "w2", "w3"]);
    }

    #[test]
    fn test_explicit_ids_intersect_with_scope() {
        let snapshot = cluster();
        let targets = resolve(&snapshot, &Scope::Worker, &set(&["w3", "w1"])).unwrap();
        assert_eq!(ids(&targets), vec!["w1", "w3"]);
    }

    #[test]
    fn test_empty_intersection_is_no_targets() {
        let snapshot = cluster();
        let result = resolve(&snapshot, &Scope::Coordinator, &set(&["w1"]));
        assert!(matches!(result, Err(Error::NoTargetNodes)));
    }

    #[test]
    fn test_unknown_id_is_rejected() {
        let snapshot = cluster();
        let result = resolve(&snapshot, &Scope::All, &set(&["w1", "w9"]));
        assert!(matches!(result, Err(Error::UnknownNode(id)) if id == "w9"));
    }

    #[test]
    fn test_empty_registry_has_no_targets() {
        let snapshot = NodeSnapshot::default();
        assert!(matches!(
            resolve(&snapshot, &Scope::All, &BTreeSet::new()),
            Err(Error::NoTargetNodes)
        ));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let snapshot = cluster();
        let explicit = set(&["w2", "c1"]);
        let first = resolve(&snapshot, &Scope::All, &explicit).unwrap();
        let second = resolve(&snapshot, &Scope::All, &explicit).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_from_query_defaults() {
        let (scope, explicit) = Scope::from_query(None, &[]).unwrap();
        assert_eq!(scope, Scope::All);
        assert!(explicit.is_empty());

        let (scope, explicit) = Scope::from_query(None, &["w2", "w1", "w2"]).unwrap();
        assert_eq!(scope, Scope::Nodes(set(&["w1", "w2"])));
        assert_eq!(explicit.len(), 2);

        assert!(Scope::from_query(Some("worker"), &[" "]).is_err());
        assert!(Scope::from_query(Some("bogus"), &[]).is_err());
    }

    #[test]
    fn test_node_set_scope_ignores_role() {
        let snapshot = cluster();
        let (scope, explicit) = Scope::from_query(None, &["c1", "w2"]).unwrap();
        let targets = resolve(&snapshot, &scope, &explicit).unwrap();
        assert_eq!(ids(&targets), vec!["c1", "w2"]);
    }
}
