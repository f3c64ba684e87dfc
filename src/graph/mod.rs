//! Typed graph domain model executed scripts operate on.
//!
//! A [`Graph`] owns exactly one [`NodeSet`] and one [`EdgeSet`]. Every edge's
//! endpoints are members of the node set; this is checked when the graph is
//! built and on every insertion, and all mutations are atomic.

/// External node/edge JSON codec.
pub mod codec;
mod edge;
mod element_set;
mod identity;
mod node;
mod properties;
mod style;
/// Field-level validation applied before model construction.
pub mod validate;

pub use edge::Edge;
pub use element_set::{EdgeSet, ElementSet, NodeSet};
pub use identity::{Entity, EntityKind, EntityRef, Identity};
pub use node::Node;
pub use properties::PropertyBag;
pub use style::{StyleRule, StyleSet};

use crate::error::ModelError;

/// A graph: one node set plus one edge set whose endpoints live in the node set.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: NodeSet,
    edges: EdgeSet,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a graph from prepared sets, checking every edge endpoint.
    pub fn from_sets(nodes: NodeSet, edges: EdgeSet) -> Result<Self, ModelError> {
        for edge in &edges {
            Self::check_endpoints(&nodes, edge)?;
        }
        Ok(Self { nodes, edges })
    }

    fn check_endpoints(nodes: &NodeSet, edge: &Edge) -> Result<(), ModelError> {
        for endpoint in [edge.incident_node(), edge.final_node()] {
            if !nodes.contains_identity(endpoint) {
                return Err(ModelError::DanglingEndpoint {
                    edge: edge.identity().clone(),
                    node: endpoint.clone(),
                });
            }
        }
        Ok(())
    }

    /// The node set.
    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    /// The edge set.
    pub fn edges(&self) -> &EdgeSet {
        &self.edges
    }

    /// Look up a node by string identity.
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get_by_str(id)
    }

    /// Look up an edge by string identity.
    pub fn get_edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get_by_str(id)
    }

    /// Look up a node by identity.
    pub fn node(&self, id: &Identity) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Look up an edge by identity.
    pub fn edge(&self, id: &Identity) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Mutable node lookup by identity.
    pub fn node_mut(&mut self, id: &Identity) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Mutable edge lookup by identity.
    pub fn edge_mut(&mut self, id: &Identity) -> Option<&mut Edge> {
        self.edges.get_mut(id)
    }

    /// Whether a node with the given string identity exists.
    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_str(id)
    }

    /// Whether an edge with the given string identity exists.
    pub fn has_edge(&self, id: &str) -> bool {
        self.edges.contains_str(id)
    }

    /// Add a node; duplicate identities are rejected.
    pub fn add_node(&mut self, node: Node) -> Result<(), ModelError> {
        self.nodes.insert(node)
    }

    /// Add an edge; both endpoints must already be in the node set.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), ModelError> {
        Self::check_endpoints(&self.nodes, &edge)?;
        self.edges.insert(edge)
    }

    /// Remove a node that no edge references.
    pub fn remove_node(&mut self, id: &Identity) -> Result<Node, ModelError> {
        if !self.nodes.contains_identity(id) {
            return Err(ModelError::NotFound {
                kind: EntityKind::Node,
                identity: id.to_string(),
            });
        }
        if self.edges.iter().any(|edge| edge.touches(id)) {
            return Err(ModelError::NodeInUse(id.clone()));
        }
        self.nodes.remove(id).ok_or_else(|| ModelError::NotFound {
            kind: EntityKind::Node,
            identity: id.to_string(),
        })
    }

    /// Remove an edge.
    pub fn remove_edge(&mut self, id: &Identity) -> Result<Edge, ModelError> {
        self.edges.remove(id).ok_or_else(|| ModelError::NotFound {
            kind: EntityKind::Edge,
            identity: id.to_string(),
        })
    }

    /// Resolve the incident node of an edge.
    pub fn incident_node(&self, edge: &Edge) -> Option<&Node> {
        self.nodes.get(edge.incident_node())
    }

    /// Resolve the final node of an edge.
    pub fn final_node(&self, edge: &Edge) -> Option<&Node> {
        self.nodes.get(edge.final_node())
    }

    /// Edges touching a node, in edge insertion order.
    pub fn incident_edges(&self, id: &Identity) -> Vec<&Edge> {
        self.edges.iter().filter(|edge| edge.touches(id)).collect()
    }

    /// Nodes reachable from `id` over one edge, honouring direction.
    pub fn neighbors(&self, id: &Identity) -> Vec<&Node> {
        let mut seen = Vec::new();
        for edge in &self.edges {
            if let Some(other) = edge.opposite(id) {
                if !seen.contains(&other) {
                    seen.push(other);
                }
            }
        }
        seen.into_iter()
            .filter_map(|other| self.nodes.get(other))
            .collect()
    }
}
