use serde_json::{Map, Value};
use std::fmt;

use super::identity::{EntityKind, Identity, derived_name, identity_comparable};
use super::{Entity, Node, PropertyBag, StyleSet};

/// A graph edge between an incident node and a final node.
///
/// The pair stores node identities; the owning [`super::Graph`] resolves them
/// and guarantees that both endpoints are members of its node set.
#[derive(Debug, Clone)]
pub struct Edge {
    identity: Identity,
    name: String,
    pair: (Identity, Identity),
    directed: bool,
    properties: PropertyBag,
    styles: StyleSet,
}

impl Edge {
    /// Create an undirected edge between two nodes.
    pub fn new(identity: impl Into<Identity>, incident: &Node, final_node: &Node) -> Self {
        Self::between(
            identity,
            incident.identity().clone(),
            final_node.identity().clone(),
        )
    }

    /// Create an undirected edge between two node identities.
    pub fn between(identity: impl Into<Identity>, incident: Identity, final_node: Identity) -> Self {
        let identity = identity.into();
        Self {
            name: derived_name(EntityKind::Edge, &identity),
            identity,
            pair: (incident, final_node),
            directed: false,
            properties: PropertyBag::new(),
            styles: StyleSet::new(),
        }
    }

    /// Set directedness.
    pub fn with_directed(mut self, directed: bool) -> Self {
        self.directed = directed;
        self
    }

    /// Override the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attach a style set.
    pub fn with_styles(mut self, styles: StyleSet) -> Self {
        self.styles = styles;
        self
    }

    /// The `(incident, final)` identity pair.
    pub fn node_pair(&self) -> (&Identity, &Identity) {
        (&self.pair.0, &self.pair.1)
    }

    /// Identity of the incident node (first element of the pair).
    pub fn incident_node(&self) -> &Identity {
        &self.pair.0
    }

    /// Identity of the final node (second element of the pair).
    pub fn final_node(&self) -> &Identity {
        &self.pair.1
    }

    /// Whether the edge is directed.
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Swap the pair; no-op for undirected edges.
    pub fn reverse_direction(&mut self) {
        if self.directed {
            std::mem::swap(&mut self.pair.0, &mut self.pair.1);
        }
    }

    /// Whether the given node identity is one of the endpoints.
    pub fn touches(&self, node: &Identity) -> bool {
        &self.pair.0 == node || &self.pair.1 == node
    }

    /// The endpoint opposite to `node`, honouring direction.
    ///
    /// Directed edges only lead from the incident node to the final node.
    pub fn opposite(&self, node: &Identity) -> Option<&Identity> {
        if &self.pair.0 == node {
            Some(&self.pair.1)
        } else if &self.pair.1 == node && !self.directed {
            Some(&self.pair.0)
        } else {
            None
        }
    }

    /// Borrow the property bag.
    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    /// Fetch a single property.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Set a single property, returning the previous value.
    pub fn set_property(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.properties.set(key, value)
    }

    /// Remove a single property.
    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    /// Merge a mapping of properties into the bag.
    pub fn update_properties(&mut self, properties: &Map<String, Value>) {
        self.properties.update(properties);
    }

    /// Borrow the style set.
    pub fn styles(&self) -> &StyleSet {
        &self.styles
    }

    /// Mutably borrow the style set.
    pub fn styles_mut(&mut self) -> &mut StyleSet {
        &mut self.styles
    }
}

impl Entity for Edge {
    const KIND: EntityKind = EntityKind::Edge;

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn name(&self) -> &str {
        &self.name
    }
}

identity_comparable!(Edge);

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = if self.directed { "->" } else { "--" };
        write!(
            f,
            "Edge(id: {}, {} {} {})",
            self.identity, self.pair.0, arrow, self.pair.1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_only_applies_to_directed_edges() {
        let a = Node::new("a");
        let b = Node::new("b");

        let mut undirected = Edge::new("ab", &a, &b);
        undirected.reverse_direction();
        assert_eq!(undirected.incident_node(), &Identity::from("a"));

        let mut directed = Edge::new("ab", &a, &b).with_directed(true);
        directed.reverse_direction();
        assert_eq!(directed.incident_node(), &Identity::from("b"));
        assert_eq!(directed.final_node(), &Identity::from("a"));
    }

    #[test]
    fn opposite_respects_direction() {
        let a = Node::new("a");
        let b = Node::new("b");
        let directed = Edge::new("ab", &a, &b).with_directed(true);
        assert_eq!(directed.opposite(a.identity()), Some(b.identity()));
        assert_eq!(directed.opposite(b.identity()), None);

        let undirected = Edge::new("ab", &a, &b);
        assert_eq!(undirected.opposite(b.identity()), Some(a.identity()));
    }
}
