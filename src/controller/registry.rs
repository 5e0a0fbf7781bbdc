//! Node directory
//!
//! The controller never discovers members itself. It reads an immutable
//! [`NodeSnapshot`] from a [`NodeRegistry`] once per call and resolves every
//! target against that one snapshot.

use crate::common::{Error, NodeRole, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// A cluster member's identity, address and role
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Unique, stable node ID
    pub id: String,
    /// Base URL of the node's agent API (e.g. `http://10.0.0.2:8081`)
    pub address: String,
    pub role: NodeRole,
}

impl NodeDescriptor {
    pub fn new(id: impl Into<String>, address: impl Into<String>, role: NodeRole) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            role,
        }
    }
}

/// Immutable set of nodes keyed (and ordered) by ID
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    nodes: BTreeMap<String, NodeDescriptor>,
}

impl NodeSnapshot {
    /// Build a snapshot, rejecting duplicate IDs
    pub fn new(nodes: impl IntoIterator<Item = NodeDescriptor>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for node in nodes {
            if map.contains_key(&node.id) {
                return Err(Error::DuplicateNode(node.id));
            }
            map.insert(node.id.clone(), node);
        }
        Ok(Self { nodes: map })
    }

    pub fn get(&self, id: &str) -> Option<&NodeDescriptor> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in ascending ID order
    pub fn iter(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Source of node snapshots.
///
/// Implementations must never hand out a torn snapshot: a node is either
/// fully present with its current address and role, or absent.
pub trait NodeRegistry: Send + Sync {
    fn snapshot(&self) -> Arc<NodeSnapshot>;
}

/// Registry backed by a fixed node list (from configuration)
#[derive(Debug, Default)]
pub struct StaticRegistry {
    current: RwLock<Arc<NodeSnapshot>>,
}

impl StaticRegistry {
    pub fn new(nodes: impl IntoIterator<Item = NodeDescriptor>) -> Result<Self> {
        Ok(Self {
            current: RwLock::new(Arc::new(NodeSnapshot::new(nodes)?)),
        })
    }

    /// Replace the whole node list.
    ///
    /// The new snapshot is validated first and then swapped in as one `Arc`,
    /// so readers see either the old list or the new one.
    pub fn replace(&self, nodes: impl IntoIterator<Item = NodeDescriptor>) -> Result<()> {
        let next = Arc::new(NodeSnapshot::new(nodes)?);
        let mut guard = self
            .current
            .write()
            .map_err(|_| Error::Internal("node registry lock poisoned".into()))?;
        tracing::info!("Node registry updated: {} -> {} nodes", guard.len(), next.len());
        *guard = next;
        Ok(())
    }
}

impl NodeRegistry for StaticRegistry {
    fn snapshot(&self) -> Arc<NodeSnapshot> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            // The snapshot behind the lock is an immutable Arc; a panicking
            // writer cannot have left it half-updated.
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
