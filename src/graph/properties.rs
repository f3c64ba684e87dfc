use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-entity mapping of property names to JSON values.
///
/// Only the owning entity mutates its bag; callers go through
/// `Node::set_property` / `Edge::update_properties` and friends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag {
    entries: Map<String, Value>,
}

impl PropertyBag {
    /// Create an empty property bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a property value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Check whether the property exists.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag holds no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.entries
    }

    pub(crate) fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub(crate) fn update(&mut self, other: &Map<String, Value>) {
        for (key, value) in other {
            self.entries.insert(key.clone(), value.clone());
        }
    }
}

impl<'a> IntoIterator for &'a PropertyBag {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
