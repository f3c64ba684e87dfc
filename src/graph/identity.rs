//! Identity-based equality, hashing and ordering for graph entities.
//!
//! Two entities are equal when they are the same concrete kind and carry the
//! same identity. Structural contents (properties, styles, endpoints) never take
//! part in comparisons, which keeps set membership stable while scripts mutate
//! entities in place.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::{Edge, Node};
use crate::error::ModelError;

/// Identity carried by every graph entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identity {
    /// Integer identity.
    Int(i64),
    /// String identity.
    Str(String),
}

impl Identity {
    /// Check whether the identity renders to the supplied string.
    pub fn matches_str(&self, text: &str) -> bool {
        match self {
            Identity::Str(value) => value == text,
            Identity::Int(value) => text.parse::<i64>().ok() == Some(*value),
        }
    }

    /// Render the identity as JSON (string or number).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Identity::Int(value) => serde_json::Value::from(*value),
            Identity::Str(value) => serde_json::Value::from(value.clone()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Int(value) => write!(f, "{}", value),
            Identity::Str(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity::Str(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity::Str(value)
    }
}

impl From<i64> for Identity {
    fn from(value: i64) -> Self {
        Identity::Int(value)
    }
}

/// Concrete kind of a graph entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A graph vertex.
    Node,
    /// A graph edge.
    Edge,
}

impl EntityKind {
    /// Prefix used when deriving display names from identities.
    pub fn prefix(self) -> &'static str {
        match self {
            EntityKind::Node => "v",
            EntityKind::Edge => "e",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Node => write!(f, "node"),
            EntityKind::Edge => write!(f, "edge"),
        }
    }
}

/// Accessors shared by every identity-comparable graph entity.
pub trait Entity {
    /// Concrete kind of the implementing type.
    const KIND: EntityKind;

    /// Unique identity of this entity within its set.
    fn identity(&self) -> &Identity;

    /// Display name (explicit, or derived from the kind prefix and identity).
    fn name(&self) -> &str;
}

/// Derive `PartialEq`, `Eq`, `Hash`, `PartialOrd` and `Ord` from an entity's identity.
macro_rules! identity_comparable {
    ($ty:ty) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                $crate::graph::Entity::identity(self) == $crate::graph::Entity::identity(other)
            }
        }

        impl Eq for $ty {}

        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                std::hash::Hash::hash(&<$ty as $crate::graph::Entity>::KIND, state);
                std::hash::Hash::hash($crate::graph::Entity::identity(self), state);
            }
        }

        impl PartialOrd for $ty {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $ty {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                $crate::graph::Entity::identity(self).cmp($crate::graph::Entity::identity(other))
            }
        }
    };
}

pub(crate) use identity_comparable;

pub(crate) fn derived_name(kind: EntityKind, identity: &Identity) -> String {
    format!("{}{}", kind.prefix(), identity)
}

/// Borrowed entity of either kind, used where nodes and edges meet dynamically.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    /// Borrowed node.
    Node(&'a Node),
    /// Borrowed edge.
    Edge(&'a Edge),
}

impl<'a> EntityRef<'a> {
    /// Kind of the referenced entity.
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Node(_) => EntityKind::Node,
            EntityRef::Edge(_) => EntityKind::Edge,
        }
    }

    /// Identity of the referenced entity.
    pub fn identity(&self) -> &'a Identity {
        match self {
            EntityRef::Node(node) => node.identity(),
            EntityRef::Edge(edge) => edge.identity(),
        }
    }

    /// Order two entities by identity; entities of different kinds cannot be ordered.
    pub fn try_cmp(&self, other: &EntityRef<'_>) -> Result<Ordering, ModelError> {
        if self.kind() != other.kind() {
            return Err(ModelError::IncomparableKinds {
                left: self.kind(),
                right: other.kind(),
            });
        }
        Ok(self.identity().cmp(other.identity()))
    }
}

impl PartialEq for EntityRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.identity() == other.identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_lookup_matches_integer_identity() {
        assert!(Identity::Int(7).matches_str("7"));
        assert!(!Identity::Int(7).matches_str("07x"));
        assert!(Identity::from("a").matches_str("a"));
    }

    #[test]
    fn entities_of_different_kinds_never_compare() {
        let node = Node::new("x");
        let a = Node::new("a");
        let b = Node::new("b");
        let edge = Edge::new("x", &a, &b);

        let left = EntityRef::Node(&node);
        let right = EntityRef::Edge(&edge);
        assert_ne!(left, right);
        assert!(matches!(
            left.try_cmp(&right),
            Err(ModelError::IncomparableKinds { .. })
        ));
        assert_eq!(
            EntityRef::Node(&a).try_cmp(&EntityRef::Node(&b)).unwrap(),
            Ordering::Less
        );
    }
}
