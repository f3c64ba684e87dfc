use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Number};

use crate::graph::Identity;

/// Runtime value manipulated by graph scripts.
///
/// Nodes and edges are held as handles (their identity); the entity itself
/// lives in the graph the script runs against.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value.
    Nil,
    /// Boolean.
    Boolean(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list.
    List(Vec<Value>),
    /// String-keyed mapping (property values decoded from JSON).
    Map(BTreeMap<String, Value>),
    /// Handle to a graph node.
    Node(Identity),
    /// Handle to a graph edge.
    Edge(Identity),
}

impl Value {
    /// Render as JSON for a trace snapshot.
    ///
    /// Values without a JSON form (entity handles, non-finite floats) are
    /// coerced to their display string.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Nil => serde_json::Value::Null,
            Value::Boolean(flag) => serde_json::Value::Bool(*flag),
            Value::Integer(num) => serde_json::Value::from(*num),
            Value::Float(num) => Number::from_f64(*num)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(self.to_string())),
            Value::String(text) => serde_json::Value::String(text.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => {
                let object: Map<String, serde_json::Value> = entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect();
                serde_json::Value::Object(object)
            }
            Value::Node(_) | Value::Edge(_) => serde_json::Value::String(self.to_string()),
        }
    }

    /// Convert a JSON property value into a script value.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(flag) => Value::Boolean(*flag),
            serde_json::Value::Number(num) => match num.as_i64() {
                Some(int) => Value::Integer(int),
                None => Value::Float(num.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Value::String(text.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(object) => Value::Map(
                object
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Truthiness used by conditionals and loops.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Boolean(flag) => *flag,
            Value::Integer(num) => *num != 0,
            Value::Float(num) => *num != 0.0,
            Value::String(text) => !text.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Node(_) | Value::Edge(_) => true,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Node(_) => "node",
            Value::Edge(_) => "edge",
        }
    }

    /// Equality with numeric promotion (`1` equals `1.0`).
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(flag) => write!(f, "{}", flag),
            Value::Integer(num) => write!(f, "{}", num),
            Value::Float(num) => write!(f, "{}", num),
            Value::String(text) => write!(f, "{}", text),
            Value::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in entries.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Node(id) => write!(f, "Node(id: {})", id),
            Value::Edge(id) => write!(f, "Edge(id: {})", id),
        }
    }
}

impl From<&Identity> for Value {
    fn from(identity: &Identity) -> Self {
        match identity {
            Identity::Int(num) => Value::Integer(*num),
            Identity::Str(text) => Value::String(text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handles_and_non_finite_floats_become_strings() {
        assert_eq!(Value::Node("a".into()).to_json(), json!("Node(id: a)"));
        assert_eq!(Value::Float(f64::INFINITY).to_json(), json!("inf"));
        assert_eq!(
            Value::List(vec![Value::Integer(1), Value::Edge(Identity::Int(2))]).to_json(),
            json!([1, "Edge(id: 2)"])
        );
    }

    #[test]
    fn json_properties_convert_both_ways() {
        let raw = json!({"weight": 2, "tags": ["x"], "ratio": 0.5, "seen": null});
        let value = Value::from_json(&raw);
        assert_eq!(value.to_json(), raw);
    }

    #[test]
    fn numeric_equality_promotes() {
        assert!(Value::Integer(1).loose_eq(&Value::Float(1.0)));
        assert!(!Value::Integer(1).loose_eq(&Value::String("1".into())));
    }
}
