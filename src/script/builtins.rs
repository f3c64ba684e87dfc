//! Builtin functions available to graph scripts.
//!
//! Builtins receive already-evaluated arguments and report failures as plain
//! messages; the runtime attaches the source line.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Value;
use crate::graph::{Edge, Entity, Graph, Identity, Node, validate};

/// Longest list `range` will materialise.
pub const MAX_RANGE_LEN: i64 = 1_000_000;

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` arguments.
    Exact(usize),
    /// At least `n` arguments.
    AtLeast(usize),
    /// Between `min` and `max` arguments, inclusive.
    Between(usize, usize),
}

impl Arity {
    /// Whether `count` arguments are acceptable.
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Between(min, max) => (min..=max).contains(&count),
        }
    }

    /// Human description for error messages.
    pub fn describe(self) -> String {
        match self {
            Arity::Exact(n) => format!("exactly {}", n),
            Arity::AtLeast(n) => format!("at least {}", n),
            Arity::Between(min, max) => format!("{} to {}", min, max),
        }
    }
}

macro_rules! builtins {
    ($($variant:ident => $name:literal, $arity:expr;)*) => {
        /// Builtin function identifiers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum Builtin {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )*
        }

        impl Builtin {
            /// Resolve a symbol to a builtin.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Builtin::$variant),)*
                    _ => None,
                }
            }

            /// Script-level name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Builtin::$variant => $name,)*
                }
            }

            /// Accepted argument counts.
            pub fn arity(self) -> Arity {
                match self {
                    $(Builtin::$variant => $arity,)*
                }
            }
        }
    };
}

builtins! {
    Add => "+", Arity::AtLeast(1);
    Sub => "-", Arity::AtLeast(1);
    Mul => "*", Arity::AtLeast(1);
    Div => "/", Arity::Exact(2);
    Rem => "%", Arity::Exact(2);
    Eq => "=", Arity::Exact(2);
    Ne => "!=", Arity::Exact(2);
    Lt => "<", Arity::Exact(2);
    Le => "<=", Arity::Exact(2);
    Gt => ">", Arity::Exact(2);
    Ge => ">=", Arity::Exact(2);
    Not => "not", Arity::Exact(1);
    List => "list", Arity::AtLeast(0);
    Len => "len", Arity::Exact(1);
    Nth => "nth", Arity::Exact(2);
    Push => "push", Arity::Exact(2);
    First => "first", Arity::Exact(1);
    Rest => "rest", Arity::Exact(1);
    Contains => "contains?", Arity::Exact(2);
    Range => "range", Arity::Between(1, 2);
    Str => "str", Arity::AtLeast(0);
    Nodes => "nodes", Arity::Exact(0);
    Edges => "edges", Arity::Exact(0);
    Node => "node", Arity::Exact(1);
    Edge => "edge", Arity::Exact(1);
    HasNode => "has-node?", Arity::Exact(1);
    HasEdge => "has-edge?", Arity::Exact(1);
    Id => "id", Arity::Exact(1);
    Incident => "incident", Arity::Exact(1);
    Final => "final", Arity::Exact(1);
    Directed => "directed?", Arity::Exact(1);
    Neighbors => "neighbors", Arity::Exact(1);
    IncidentEdges => "incident-edges", Arity::Exact(1);
    Get => "get", Arity::Between(2, 3);
    SetProp => "set-prop!", Arity::Exact(3);
    Reverse => "reverse!", Arity::Exact(1);
    AddNode => "add-node!", Arity::Between(1, 2);
    AddEdge => "add-edge!", Arity::Between(3, 4);
    RemoveNode => "remove-node!", Arity::Exact(1);
    RemoveEdge => "remove-edge!", Arity::Exact(1);
}

type BuiltinResult = Result<Value, String>;

/// Invoke a builtin against evaluated arguments.
pub fn call_builtin(builtin: Builtin, args: Vec<Value>, graph: &mut Graph) -> BuiltinResult {
    match builtin {
        Builtin::Add => fold_numeric(builtin, args, add),
        Builtin::Sub if args.len() == 1 => negate(&args[0]),
        Builtin::Sub => fold_numeric(builtin, args, |a, b| arith(a, b, i64::checked_sub, |x, y| x - y)),
        Builtin::Mul => fold_numeric(builtin, args, |a, b| arith(a, b, i64::checked_mul, |x, y| x * y)),
        Builtin::Div => divide(&args[0], &args[1]),
        Builtin::Rem => remainder(&args[0], &args[1]),
        Builtin::Eq => Ok(Value::Boolean(args[0].loose_eq(&args[1]))),
        Builtin::Ne => Ok(Value::Boolean(!args[0].loose_eq(&args[1]))),
        Builtin::Lt => compare(&args[0], &args[1]).map(|ord| Value::Boolean(ord.is_lt())),
        Builtin::Le => compare(&args[0], &args[1]).map(|ord| Value::Boolean(ord.is_le())),
        Builtin::Gt => compare(&args[0], &args[1]).map(|ord| Value::Boolean(ord.is_gt())),
        Builtin::Ge => compare(&args[0], &args[1]).map(|ord| Value::Boolean(ord.is_ge())),
        Builtin::Not => Ok(Value::Boolean(!args[0].truthy())),
        Builtin::List => Ok(Value::List(args)),
        Builtin::Len => length(&args[0]),
        Builtin::Nth => nth(&args[0], &args[1]),
        Builtin::Push => {
            let mut args = args.into_iter();
            match (args.next(), args.next()) {
                (Some(Value::List(mut items)), Some(item)) => {
                    items.push(item);
                    Ok(Value::List(items))
                }
                (Some(other), _) => Err(type_error(builtin, "a list", &other)),
                _ => Err(format!("`{}` expects a list and a value", builtin.name())),
            }
        }
        Builtin::First => match &args[0] {
            Value::List(items) => Ok(items.first().cloned().unwrap_or(Value::Nil)),
            other => Err(type_error(builtin, "a list", other)),
        },
        Builtin::Rest => match &args[0] {
            Value::List(items) => Ok(Value::List(items.iter().skip(1).cloned().collect())),
            other => Err(type_error(builtin, "a list", other)),
        },
        Builtin::Contains => contains(&args[0], &args[1]),
        Builtin::Range => range(&args),
        Builtin::Str => Ok(Value::String(args.iter().map(ToString::to_string).collect())),
        Builtin::Nodes => Ok(Value::List(
            graph.nodes().identities().cloned().map(Value::Node).collect(),
        )),
        Builtin::Edges => Ok(Value::List(
            graph.edges().identities().cloned().map(Value::Edge).collect(),
        )),
        Builtin::Node => node_id(graph, &args[0]).map(Value::Node),
        Builtin::Edge => edge_id(graph, &args[0]).map(Value::Edge),
        Builtin::HasNode => Ok(Value::Boolean(node_id(graph, &args[0]).is_ok())),
        Builtin::HasEdge => Ok(Value::Boolean(edge_id(graph, &args[0]).is_ok())),
        Builtin::Id => match &args[0] {
            Value::Node(id) | Value::Edge(id) => Ok(Value::from(id)),
            other => Err(type_error(builtin, "a node or an edge", other)),
        },
        Builtin::Incident => {
            let edge = lookup_edge(graph, &args[0])?;
            Ok(Value::Node(edge.incident_node().clone()))
        }
        Builtin::Final => {
            let edge = lookup_edge(graph, &args[0])?;
            Ok(Value::Node(edge.final_node().clone()))
        }
        Builtin::Directed => Ok(Value::Boolean(lookup_edge(graph, &args[0])?.is_directed())),
        Builtin::Neighbors => {
            let id = node_id(graph, &args[0])?;
            Ok(Value::List(
                graph
                    .neighbors(&id)
                    .into_iter()
                    .map(|node| Value::Node(node.identity().clone()))
                    .collect(),
            ))
        }
        Builtin::IncidentEdges => {
            let id = node_id(graph, &args[0])?;
            Ok(Value::List(
                graph
                    .incident_edges(&id)
                    .into_iter()
                    .map(|edge| Value::Edge(edge.identity().clone()))
                    .collect(),
            ))
        }
        Builtin::Get => get(graph, &args),
        Builtin::SetProp => set_prop(graph, args),
        Builtin::Reverse => {
            let id = edge_id(graph, &args[0])?;
            if let Some(edge) = graph.edge_mut(&id) {
                edge.reverse_direction();
            }
            Ok(Value::Edge(id))
        }
        Builtin::AddNode => add_node(graph, &args),
        Builtin::AddEdge => add_edge(graph, &args),
        Builtin::RemoveNode => {
            let id = node_id(graph, &args[0])?;
            graph.remove_node(&id).map_err(|err| err.to_string())?;
            Ok(Value::Nil)
        }
        Builtin::RemoveEdge => {
            let id = edge_id(graph, &args[0])?;
            graph.remove_edge(&id).map_err(|err| err.to_string())?;
            Ok(Value::Nil)
        }
    }
}

fn type_error(builtin: Builtin, expected: &str, got: &Value) -> String {
    format!(
        "`{}` expects {}, got {} {}",
        builtin.name(),
        expected,
        got.type_name(),
        got
    )
}

fn fold_numeric(
    builtin: Builtin,
    args: Vec<Value>,
    op: impl Fn(Value, Value) -> BuiltinResult,
) -> BuiltinResult {
    let mut args = args.into_iter();
    let first = args
        .next()
        .ok_or_else(|| format!("`{}` expects at least one argument", builtin.name()))?;
    args.try_fold(first, op)
}

fn add(a: Value, b: Value) -> BuiltinResult {
    match (a, b) {
        (Value::String(mut left), Value::String(right)) => {
            left.push_str(&right);
            Ok(Value::String(left))
        }
        (Value::List(mut left), Value::List(right)) => {
            left.extend(right);
            Ok(Value::List(left))
        }
        (a, b) => arith(a, b, i64::checked_add, |x, y| x + y),
    }
}

fn arith(
    a: Value,
    b: Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> BuiltinResult {
    match (&a, &b) {
        (Value::Integer(x), Value::Integer(y)) => int_op(*x, *y)
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow".to_string()),
        _ => match (as_float(&a), as_float(&b)) {
            (Some(x), Some(y)) => Ok(Value::Float(float_op(x, y))),
            _ => Err(format!(
                "unsupported operand types: {} and {}",
                a.type_name(),
                b.type_name()
            )),
        },
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(num) => Some(*num as f64),
        Value::Float(num) => Some(*num),
        _ => None,
    }
}

fn negate(value: &Value) -> BuiltinResult {
    match value {
        Value::Integer(num) => num
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow".to_string()),
        Value::Float(num) => Ok(Value::Float(-num)),
        other => Err(type_error(Builtin::Sub, "a number", other)),
    }
}

/// Integer division truncates; any float operand yields a float.
fn divide(a: &Value, b: &Value) -> BuiltinResult {
    match (a, b) {
        (Value::Integer(_), Value::Integer(0)) => Err("division by zero".into()),
        (Value::Integer(x), Value::Integer(y)) => x
            .checked_div(*y)
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow".to_string()),
        _ => match (as_float(a), as_float(b)) {
            (Some(_), Some(y)) if y == 0.0 => Err("division by zero".into()),
            (Some(x), Some(y)) => Ok(Value::Float(x / y)),
            _ => Err(format!(
                "unsupported operand types: {} and {}",
                a.type_name(),
                b.type_name()
            )),
        },
    }
}

fn remainder(a: &Value, b: &Value) -> BuiltinResult {
    match (a, b) {
        (Value::Integer(_), Value::Integer(0)) => Err("modulo by zero".into()),
        (Value::Integer(x), Value::Integer(y)) => x
            .checked_rem_euclid(*y)
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow".to_string()),
        _ => Err(format!(
            "`%` expects integers, got {} and {}",
            a.type_name(),
            b.type_name()
        )),
    }
}

fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, String> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Integer(x), Value::Integer(y)) => Ok(x.cmp(y)),
        _ => match (as_float(a), as_float(b)) {
            (Some(x), Some(y)) => x
                .partial_cmp(&y)
                .ok_or_else(|| "cannot order NaN".to_string()),
            _ => Err(format!(
                "cannot order {} and {}",
                a.type_name(),
                b.type_name()
            )),
        },
    }
}

fn length(value: &Value) -> BuiltinResult {
    let len = match value {
        Value::List(items) => items.len(),
        Value::String(text) => text.chars().count(),
        Value::Map(entries) => entries.len(),
        other => return Err(type_error(Builtin::Len, "a list, string or map", other)),
    };
    Ok(Value::Integer(len as i64))
}

fn nth(collection: &Value, index: &Value) -> BuiltinResult {
    let Value::Integer(raw) = index else {
        return Err(type_error(Builtin::Nth, "an integer index", index));
    };
    let position = usize::try_from(*raw).map_err(|_| format!("index {} out of range", raw))?;
    let found = match collection {
        Value::List(items) => items.get(position).cloned(),
        Value::String(text) => text
            .chars()
            .nth(position)
            .map(|ch| Value::String(ch.to_string())),
        other => return Err(type_error(Builtin::Nth, "a list or string", other)),
    };
    found.ok_or_else(|| format!("index {} out of range", raw))
}

fn contains(collection: &Value, needle: &Value) -> BuiltinResult {
    let found = match (collection, needle) {
        (Value::List(items), _) => items.iter().any(|item| item.loose_eq(needle)),
        (Value::String(text), Value::String(part)) => text.contains(part.as_str()),
        (Value::Map(entries), Value::String(key)) => entries.contains_key(key),
        (other, _) => {
            return Err(type_error(Builtin::Contains, "a list, string or map", other));
        }
    };
    Ok(Value::Boolean(found))
}

fn range(args: &[Value]) -> BuiltinResult {
    let bounds: Vec<i64> = args
        .iter()
        .map(|arg| match arg {
            Value::Integer(num) => Ok(*num),
            other => Err(type_error(Builtin::Range, "integer bounds", other)),
        })
        .collect::<Result<_, _>>()?;
    let (start, end) = match bounds.as_slice() {
        [end] => (0, *end),
        [start, end] => (*start, *end),
        _ => return Err("`range` expects one or two bounds".into()),
    };
    if end.saturating_sub(start) > MAX_RANGE_LEN {
        return Err(format!("range longer than {} elements", MAX_RANGE_LEN));
    }
    Ok(Value::List((start..end).map(Value::Integer).collect()))
}

fn identity_arg(value: &Value) -> Option<Identity> {
    match value {
        Value::String(text) => Some(Identity::Str(text.clone())),
        Value::Integer(num) => Some(Identity::Int(*num)),
        _ => None,
    }
}

fn node_id(graph: &Graph, value: &Value) -> Result<Identity, String> {
    let found = match value {
        Value::Node(id) => graph.node(id),
        Value::String(text) => graph.get_node(text),
        other => identity_arg(other).and_then(|id| graph.node(&id).map(|node| node as &Node)),
    };
    match found {
        Some(node) => Ok(node.identity().clone()),
        None => match value {
            Value::Node(_) | Value::String(_) | Value::Integer(_) => {
                Err(format!("node '{}' not found", display_id(value)))
            }
            other => Err(format!("expected a node or node id, got {}", other.type_name())),
        },
    }
}

fn edge_id(graph: &Graph, value: &Value) -> Result<Identity, String> {
    let found = match value {
        Value::Edge(id) => graph.edge(id),
        Value::String(text) => graph.get_edge(text),
        other => identity_arg(other).and_then(|id| graph.edge(&id).map(|edge| edge as &Edge)),
    };
    match found {
        Some(edge) => Ok(edge.identity().clone()),
        None => match value {
            Value::Edge(_) | Value::String(_) | Value::Integer(_) => {
                Err(format!("edge '{}' not found", display_id(value)))
            }
            other => Err(format!("expected an edge or edge id, got {}", other.type_name())),
        },
    }
}

fn display_id(value: &Value) -> String {
    match value {
        Value::Node(id) | Value::Edge(id) => id.to_string(),
        other => other.to_string(),
    }
}

fn lookup_edge<'g>(graph: &'g Graph, value: &Value) -> Result<&'g Edge, String> {
    let id = edge_id(graph, value)?;
    graph
        .edge(&id)
        .ok_or_else(|| format!("edge '{}' not found", id))
}

fn get(graph: &Graph, args: &[Value]) -> BuiltinResult {
    let default = args.get(2).cloned().unwrap_or(Value::Nil);
    let found = match (&args[0], &args[1]) {
        (Value::Map(entries), Value::String(key)) => entries.get(key).cloned(),
        (Value::Node(_), Value::String(key)) => {
            let id = node_id(graph, &args[0])?;
            graph
                .node(&id)
                .and_then(|node| node.property(key))
                .map(Value::from_json)
        }
        (Value::Edge(_), Value::String(key)) => lookup_edge(graph, &args[0])?
            .property(key)
            .map(Value::from_json),
        (target, Value::String(_)) => {
            return Err(type_error(Builtin::Get, "a node, edge or map", target));
        }
        (_, key) => return Err(type_error(Builtin::Get, "a string key", key)),
    };
    Ok(found.unwrap_or(default))
}

fn set_prop(graph: &mut Graph, args: Vec<Value>) -> BuiltinResult {
    let Value::String(key) = &args[1] else {
        return Err(type_error(Builtin::SetProp, "a string key", &args[1]));
    };
    validate::property_key(key).map_err(|err| err.to_string())?;
    let value = args[2].clone();
    match &args[0] {
        Value::Node(_) => {
            let id = node_id(graph, &args[0])?;
            if let Some(node) = graph.node_mut(&id) {
                node.set_property(key.clone(), value.to_json());
            }
        }
        Value::Edge(_) => {
            let id = edge_id(graph, &args[0])?;
            if let Some(edge) = graph.edge_mut(&id) {
                edge.set_property(key.clone(), value.to_json());
            }
        }
        other => return Err(type_error(Builtin::SetProp, "a node or an edge", other)),
    }
    Ok(value)
}

fn new_identity(value: &Value) -> Result<Identity, String> {
    let raw = match value {
        Value::String(text) => serde_json::Value::String(text.clone()),
        Value::Integer(num) => serde_json::Value::from(*num),
        other => return Err(format!("identity must be a string or integer, got {}", other.type_name())),
    };
    validate::identity(&raw, "identity").map_err(|err| err.to_string())
}

fn properties_arg(builtin: Builtin, value: Option<&Value>) -> Result<BTreeMap<String, Value>, String> {
    match value {
        None | Some(Value::Nil) => Ok(BTreeMap::new()),
        Some(Value::Map(entries)) => Ok(entries.clone()),
        Some(other) => Err(type_error(builtin, "a property map", other)),
    }
}

fn add_node(graph: &mut Graph, args: &[Value]) -> BuiltinResult {
    let id = new_identity(&args[0])?;
    let properties = properties_arg(Builtin::AddNode, args.get(1))?;
    let mut node = Node::new(id.clone());
    for (key, value) in properties {
        node.set_property(key, value.to_json());
    }
    graph.add_node(node).map_err(|err| err.to_string())?;
    Ok(Value::Node(id))
}

fn add_edge(graph: &mut Graph, args: &[Value]) -> BuiltinResult {
    let id = new_identity(&args[0])?;
    let source = node_id(graph, &args[1])?;
    let target = node_id(graph, &args[2])?;
    let directed = args.get(3).is_some_and(Value::truthy);
    let edge = Edge::between(id.clone(), source, target).with_directed(directed);
    graph.add_edge(edge).map_err(|err| err.to_string())?;
    Ok(Value::Edge(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Graph {
        let mut graph = Graph::new();
        for id in ["a", "b", "c"] {
            graph.add_node(Node::new(id)).unwrap();
        }
        graph.add_edge(Edge::between("ab", "a".into(), "b".into())).unwrap();
        graph.add_edge(Edge::between("bc", "b".into(), "c".into())).unwrap();
        graph
    }

    fn call(builtin: &str, args: Vec<Value>, graph: &mut Graph) -> BuiltinResult {
        call_builtin(Builtin::from_name(builtin).unwrap(), args, graph)
    }

    #[test]
    fn arithmetic_promotes_and_checks() {
        let mut graph = Graph::new();
        assert_eq!(
            call("+", vec![Value::Integer(1), Value::Float(0.5)], &mut graph).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            call("/", vec![Value::Integer(7), Value::Integer(2)], &mut graph).unwrap(),
            Value::Integer(3)
        );
        assert!(call("/", vec![Value::Integer(1), Value::Integer(0)], &mut graph).is_err());
        assert!(call("+", vec![Value::Integer(i64::MAX), Value::Integer(1)], &mut graph).is_err());
    }

    #[test]
    fn graph_access_resolves_ids_and_handles() {
        let mut graph = triangle();
        let b = call("node", vec![Value::String("b".into())], &mut graph).unwrap();
        assert_eq!(b, Value::Node("b".into()));
        let neighbors = call("neighbors", vec![b], &mut graph).unwrap();
        assert_eq!(
            neighbors,
            Value::List(vec![Value::Node("a".into()), Value::Node("c".into())])
        );
        let err = call("node", vec![Value::String("z".into())], &mut graph).unwrap_err();
        assert!(err.contains("'z'"));
    }

    #[test]
    fn properties_are_written_through_to_the_graph() {
        let mut graph = triangle();
        let a = Value::Node("a".into());
        call(
            "set-prop!",
            vec![a.clone(), Value::String("dist".into()), Value::Integer(0)],
            &mut graph,
        )
        .unwrap();
        assert_eq!(
            call("get", vec![a, Value::String("dist".into())], &mut graph).unwrap(),
            Value::Integer(0)
        );
        assert_eq!(
            graph.get_node("a").unwrap().property("dist"),
            Some(&serde_json::json!(0))
        );
    }

    #[test]
    fn removing_a_connected_node_fails() {
        let mut graph = triangle();
        assert!(call("remove-node!", vec![Value::String("b".into())], &mut graph).is_err());
        assert_eq!(graph.nodes().len(), 3);
    }

    #[test]
    fn range_is_bounded() {
        let mut graph = Graph::new();
        assert_eq!(
            call("range", vec![Value::Integer(3)], &mut graph).unwrap(),
            Value::List(vec![Value::Integer(0), Value::Integer(1), Value::Integer(2)])
        );
        assert!(call("range", vec![Value::Integer(MAX_RANGE_LEN + 1)], &mut graph).is_err());
    }
}
