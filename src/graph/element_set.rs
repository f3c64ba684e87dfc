//! Homogeneous, identity-keyed collections of graph entities.

use std::collections::HashMap;

use super::identity::Identity;
use super::{Edge, Entity, Node};
use crate::error::ModelError;

/// Insertion-ordered set of entities of one kind, unique by identity.
///
/// Inserting an element whose identity is already present is an error; the set
/// is left untouched in that case. `Int(1)` and `Str("1")` print the same and
/// count as the same identity here.
#[derive(Debug, Clone)]
pub struct ElementSet<T: Entity> {
    elements: Vec<T>,
    index: HashMap<Identity, usize>,
}

/// Set of graph nodes.
pub type NodeSet = ElementSet<Node>;
/// Set of graph edges.
pub type EdgeSet = ElementSet<Edge>;

impl<T: Entity> Default for ElementSet<T> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Entity> ElementSet<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from elements, rejecting duplicate identities.
    pub fn from_elements<I>(elements: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = T>,
    {
        let mut set = Self::new();
        for element in elements {
            set.insert(element)?;
        }
        Ok(set)
    }

    /// Insert an element; duplicate identities are rejected.
    pub fn insert(&mut self, element: T) -> Result<(), ModelError> {
        let identity = element.identity();
        let twin_present =
            display_twin(identity).is_some_and(|twin| self.index.contains_key(&twin));
        if twin_present || self.index.contains_key(identity) {
            return Err(ModelError::DuplicateIdentity {
                kind: T::KIND,
                identity: element.identity().clone(),
            });
        }
        self.index
            .insert(element.identity().clone(), self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    /// Remove an element by identity, preserving the order of the rest.
    pub fn remove(&mut self, identity: &Identity) -> Option<T> {
        let position = self.index.remove(identity)?;
        let removed = self.elements.remove(position);
        for element in &self.elements[position..] {
            if let Some(slot) = self.index.get_mut(element.identity()) {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Look up an element by identity.
    pub fn get(&self, identity: &Identity) -> Option<&T> {
        self.index.get(identity).map(|&pos| &self.elements[pos])
    }

    /// Mutable lookup by identity.
    pub fn get_mut(&mut self, identity: &Identity) -> Option<&mut T> {
        match self.index.get(identity) {
            Some(&pos) => self.elements.get_mut(pos),
            None => None,
        }
    }

    /// Look up an element by the string form of its identity.
    ///
    /// A string identity is tried before the integer it parses to, so `"01"`
    /// finds `Str("01")` when present and `Int(1)` otherwise.
    pub fn get_by_str(&self, identity: &str) -> Option<&T> {
        self.resolve_str(identity).and_then(|id| self.get(&id))
    }

    /// Mutable lookup by the string form of its identity.
    pub fn get_by_str_mut(&mut self, identity: &str) -> Option<&mut T> {
        match self.resolve_str(identity) {
            Some(id) => self.get_mut(&id),
            None => None,
        }
    }

    fn resolve_str(&self, identity: &str) -> Option<Identity> {
        let as_str = Identity::Str(identity.to_string());
        if self.index.contains_key(&as_str) {
            return Some(as_str);
        }
        let as_int = Identity::Int(identity.parse::<i64>().ok()?);
        if self.index.contains_key(&as_int) {
            Some(as_int)
        } else {
            None
        }
    }

    /// Membership by instance.
    pub fn contains(&self, element: &T) -> bool {
        self.index.contains_key(element.identity())
    }

    /// Membership by identity value.
    pub fn contains_identity(&self, identity: &Identity) -> bool {
        self.index.contains_key(identity)
    }

    /// Membership by string identity.
    pub fn contains_str(&self, identity: &str) -> bool {
        self.resolve_str(identity).is_some()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterate in first-insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    /// Identities in first-insertion order.
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.elements.iter().map(Entity::identity)
    }
}

/// The other variant that renders to the same string, if any.
fn display_twin(identity: &Identity) -> Option<Identity> {
    match identity {
        Identity::Int(n) => Some(Identity::Str(n.to_string())),
        Identity::Str(s) => match s.parse::<i64>() {
            Ok(n) if n.to_string() == *s => Some(Identity::Int(n)),
            _ => None,
        },
    }
}

impl<'a, T: Entity> IntoIterator for &'a ElementSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_identity_without_mutation() {
        let mut set = NodeSet::from_elements([Node::new("a"), Node::new("b")]).unwrap();
        let err = set.insert(Node::new("a").with_name("other")).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateIdentity { .. }));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(&"a".into()).unwrap().name(), "va");
    }

    #[test]
    fn constructor_rejects_duplicates() {
        assert!(NodeSet::from_elements([Node::new("a"), Node::new("a")]).is_err());
    }

    #[test]
    fn removal_keeps_insertion_order_and_index() {
        let mut set =
            NodeSet::from_elements(["a", "b", "c", "d"].map(Node::new)).unwrap();
        assert!(set.remove(&"b".into()).is_some());
        let order: Vec<String> = set.identities().map(|id| id.to_string()).collect();
        assert_eq!(order, vec!["a", "c", "d"]);
        assert_eq!(set.get(&"d".into()).unwrap().identity(), &Identity::from("d"));
        assert!(set.remove(&"b".into()).is_none());
    }

    #[test]
    fn lookup_by_string_finds_integer_identities() {
        let set = NodeSet::from_elements([Node::new(1), Node::new("2")]).unwrap();
        assert!(set.contains_str("1"));
        assert!(set.contains_str("2"));
        assert!(!set.contains_str("3"));
        assert_eq!(set.get_by_str("1").unwrap().identity(), &Identity::Int(1));
    }

    #[test]
    fn integer_and_its_string_form_collide() {
        let mut set = NodeSet::from_elements([Node::new(1)]).unwrap();
        let err = set.insert(Node::new("1")).unwrap_err();
        assert!(matches!(
            err,
            ModelError::DuplicateIdentity { identity: Identity::Str(_), .. }
        ));

        let mut set = NodeSet::from_elements([Node::new("7")]).unwrap();
        assert!(set.insert(Node::new(7)).is_err());
        assert_eq!(set.len(), 1);
        assert!(NodeSet::from_elements([Node::new(-3), Node::new("-3")]).is_err());
    }

    #[test]
    fn non_canonical_numeric_strings_stay_distinct() {
        let mut set = NodeSet::from_elements([Node::new(1)]).unwrap();
        set.insert(Node::new("01")).unwrap();
        assert_eq!(set.get_by_str("01").unwrap().identity(), &Identity::from("01"));
        assert_eq!(set.get_by_str("1").unwrap().identity(), &Identity::Int(1));
    }
}
