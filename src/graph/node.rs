use serde_json::{Map, Value};
use std::fmt;

use super::identity::{EntityKind, Identity, derived_name, identity_comparable};
use super::{Entity, PropertyBag, StyleSet};

/// A graph vertex.
#[derive(Debug, Clone)]
pub struct Node {
    identity: Identity,
    name: String,
    properties: PropertyBag,
    styles: StyleSet,
}

impl Node {
    /// Create a node with no properties and no styles.
    pub fn new(identity: impl Into<Identity>) -> Self {
        let identity = identity.into();
        Self {
            name: derived_name(EntityKind::Node, &identity),
            identity,
            properties: PropertyBag::new(),
            styles: StyleSet::new(),
        }
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

impl Entity for Node {
    const KIND: EntityKind = EntityKind::Node;

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn name(&self) -> &str {
        &self.name
    }
}

identity_comparable!(Node);

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node(id: {})", self.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn equality_ignores_contents() {
        let mut a = Node::new("a");
        a.set_property("dist", json!(3));
        let b = Node::new("a").with_name("alpha");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn derives_prefixed_name() {
        assert_eq!(Node::new("a").name(), "va");
        assert_eq!(Node::new(4).name(), "v4");
        assert_eq!(Node::new("a").to_string(), "Node(id: a)");
    }
}
